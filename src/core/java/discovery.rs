use regex::Regex;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::LaunchConfig;
use crate::core::launch::Placeholders;
use crate::core::platform::is_windows;

/// Fallback when nothing better is configured or found.
pub const DEFAULT_JAVA: &str = "java";

/// Pick the java executable for launching and installing.
///
/// Priority: forced path, then the first `java` on the search path whose
/// version matches `supportedJavaVersions`, then plain `java`.
#[instrument(skip_all)]
pub async fn resolve_java_executable(config: &LaunchConfig, placeholders: &Placeholders) -> String {
    let forced = config.forced_java_path.trim();
    if !forced.is_empty() {
        return placeholders.apply(forced);
    }

    if config.supported_java_versions.is_empty() {
        return DEFAULT_JAVA.to_string();
    }

    info!(
        "Attempting to find suitable jvm for supported versions {:?}",
        config.supported_java_versions
    );

    let candidates = match list_java_candidates().await {
        Ok(candidates) => candidates,
        Err(e) => {
            error!("Couldn't find jvm, falling back to '{}': {}", DEFAULT_JAVA, e);
            return DEFAULT_JAVA.to_string();
        }
    };

    match find_matching_java(&candidates, &config.supported_java_versions).await {
        Some(java) => java,
        None => {
            warn!(
                "Couldn't find any JVM installation matching the supported versions, falling back to '{}', but this might fail.",
                DEFAULT_JAVA
            );
            DEFAULT_JAVA.to_string()
        }
    }
}

/// First candidate whose `-version` output reports a supported version.
async fn find_matching_java(candidates: &[String], versions: &[u32]) -> Option<String> {
    for candidate in candidates {
        let Some(output) = probe_version(candidate).await else {
            continue;
        };
        if version_output_matches(&output, versions) {
            info!("Found suitable JVM at path {}", candidate);
            return Some(candidate.replace('\\', "/"));
        }
        debug!("{} does not report a supported version", candidate);
    }
    None
}

/// Every `java` visible on the search path, in search order.
async fn list_java_candidates() -> std::io::Result<Vec<String>> {
    let output = if is_windows() {
        Command::new("where").arg("java").output().await?
    } else {
        Command::new("which").args(["-a", "java"]).output().await?
    };

    let candidates = parse_candidates(&String::from_utf8_lossy(&output.stdout));
    debug!("Java candidates: {:?}", candidates);
    Ok(candidates)
}

/// One path per line, blank lines and repeats dropped, search order kept.
fn parse_candidates(listing: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    for line in listing.lines() {
        let line = line.trim();
        if !line.is_empty() && !candidates.iter().any(|c| c == line) {
            candidates.push(line.to_string());
        }
    }
    candidates
}

/// Output of `<java> -version`; the JVM prints it on stderr.
async fn probe_version(java: &str) -> Option<String> {
    match Command::new(java).arg("-version").output().await {
        Ok(output) => Some(format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        )),
        Err(e) => {
            debug!("Probing {} failed: {}", java, e);
            None
        }
    }
}

/// Whether a `-version` output reports one of the given major versions.
///
/// Accepts both the legacy `"1.8.0_392"` and the modern `"17.0.8"` form.
pub fn version_output_matches(output: &str, versions: &[u32]) -> bool {
    versions.iter().any(|v| {
        Regex::new(&format!(r#""(1\.)?{}(?:[._+\-"]|$)"#, v))
            .map(|re| re.is_match(output))
            .unwrap_or(false)
    })
}
