pub mod command;
pub mod crash;
pub mod ramdisk;
pub mod registry;
pub mod supervisor;

pub use command::{build_launch_command, derive_min_heap, heap_flags, Placeholders};
pub use crash::{parse_crash_timer, CrashWindow, CRASH_TIMER_DISABLED};
pub use ramdisk::RamDiskSync;
pub use registry::ProcessRegistry;
pub use supervisor::{LaunchSupervisor, SupervisorState};
