use std::path::Path;

use chrono::{DateTime, Local, Offset, TimeZone};
use tracing::{info, warn};

use crate::core::error::{StarterError, StarterResult};

pub const EULA_FILE: &str = "eula.txt";
const EULA_URL: &str = "https://account.mojang.com/documents/minecraft_eula";

/// A single yes/no decision from whoever runs the server.
pub trait LicensePrompt: Send + Sync {
    fn confirm(&self) -> bool;
}

/// Asks on the terminal; typing `true` accepts.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl LicensePrompt for StdinPrompt {
    fn confirm(&self) -> bool {
        info!("You have not accepted the eula yet.");
        info!("By typing TRUE you are indicating your agreement to the EULA of Mojang.");
        info!("Read it at {} before accepting it.", EULA_URL);

        let mut answer = String::new();
        match std::io::stdin().read_line(&mut answer) {
            Ok(_) => answer.trim().eq_ignore_ascii_case("true"),
            Err(e) => {
                warn!("Could not read answer from stdin: {}", e);
                false
            }
        }
    }
}

/// `Sat Mar 02 14:03:11 GMT+1 2024`, offset spelled the way the
/// server writes its own `eula.txt`.
fn gmt_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let offset = now.offset().fix().local_minus_utc();
    let zone = if offset == 0 {
        "GMT".to_string()
    } else {
        let sign = if offset < 0 { '-' } else { '+' };
        let minutes = offset.abs() / 60;
        match minutes % 60 {
            0 => format!("GMT{}{}", sign, minutes / 60),
            rest => format!("GMT{}{}:{:02}", sign, minutes / 60, rest),
        }
    };
    format!(
        "{} {} {}",
        now.format("%a %b %d %H:%M:%S"),
        zone,
        now.format("%Y")
    )
}

fn default_lines() -> Vec<String> {
    vec![
        format!(
            "#By changing the setting below to TRUE you are indicating your agreement to our EULA ({}).",
            EULA_URL
        ),
        format!("#{}", gmt_timestamp(&Local::now())),
        "eula=false".to_string(),
    ]
}

/// Make sure `eula.txt` exists and ask for agreement if it is not given yet.
///
/// Returns whether the agreement line now reads `eula=true`.
pub fn check_eula(base: &Path, prompt: &dyn LicensePrompt) -> StarterResult<bool> {
    let path = base.join(EULA_FILE);

    let mut lines: Vec<String> = match std::fs::read_to_string(&path) {
        Ok(raw) => raw.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let lines = default_lines();
            write_lines(&path, &lines)?;
            lines
        }
        Err(e) => return Err(StarterError::io(&path)(e)),
    };

    // a hand written file may be shorter; it is left alone
    let Some(agreement) = lines.get(2) else {
        warn!("{:?} does not have the expected three lines, leaving it as it is", path);
        return Ok(lines.iter().any(|l| is_accepted(l)));
    };
    if agreement.contains("true") {
        return Ok(true);
    }

    if !prompt.confirm() {
        return Ok(false);
    }

    info!("You have accepted the EULA.");
    lines[2] = "eula=true".to_string();
    write_lines(&path, &lines)?;
    Ok(true)
}

fn is_accepted(line: &str) -> bool {
    line.trim()
        .strip_prefix("eula=")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn write_lines(path: &Path, lines: &[String]) -> StarterResult<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(path, content).map_err(StarterError::io(path))
}
