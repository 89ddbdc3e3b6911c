//! Whole-process restart, the recovery path of `RestartPolicy::RestartProcess`

use std::io;
use std::process::Command;

/// Command that starts this executable again with the same arguments
pub fn restart_command() -> io::Result<Command> {
    let exe = std::env::current_exe()?;
    let mut command = Command::new(exe);
    command.args(std::env::args_os().skip(1));
    Ok(command)
}

/// Replace the current process with a fresh copy of itself.
///
/// Only returns if the restart could not be performed.
pub fn restart_process() -> io::Error {
    let mut command = match restart_command() {
        Ok(command) => command,
        Err(e) => return e,
    };
    tracing::warn!("Restarting {:?}", command.get_program());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.exec()
    }

    #[cfg(not(unix))]
    {
        match command.spawn() {
            Ok(_) => std::process::exit(0),
            Err(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_command_targets_current_exe() {
        let command = restart_command().unwrap();
        assert_eq!(
            command.get_program(),
            std::env::current_exe().unwrap().as_os_str()
        );
        let expected: Vec<_> = std::env::args_os().skip(1).collect();
        let actual: Vec<_> = command.get_args().map(|a| a.to_os_string()).collect();
        assert_eq!(actual, expected);
    }
}
