//! Configuration loading helpers for the migrator CLI.
//!
//! Configuration flags may appear anywhere on the command line. They are
//! routed to `ortho-config` while every other token is left for `clap`.

use std::ffi::{OsStr, OsString};

use migrator_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the program name and the configuration
    /// flags of the command line.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

impl OrthoConfigLoader {
    fn process_config_flag(argument: &OsStr) -> FlagAction {
        let argument_text = argument.to_string_lossy();
        if !argument_text.starts_with("--") {
            return FlagAction::Skip;
        }

        let mut flag_parts = argument_text.splitn(2, '=');
        let flag = flag_parts.next().unwrap_or_default();
        let has_inline_value = flag_parts.next().is_some();

        if super::CONFIG_SWITCHES.contains(&flag) {
            return FlagAction::Include { needs_value: false };
        }
        if super::CONFIG_CLI_FLAGS.contains(&flag) {
            return FlagAction::Include {
                needs_value: !has_inline_value,
            };
        }

        FlagAction::Skip
    }
}

/// Command-line tokens partitioned between the two parsers.
///
/// Both lists start with the program name.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ConfigArgumentSplit::default();
    };

    let mut split = ConfigArgumentSplit {
        config_arguments: vec![program.clone()],
        command_arguments: vec![program.clone()],
    };
    let mut pending_value = false;
    let mut passthrough = false;

    for argument in rest {
        if passthrough {
            split.command_arguments.push(argument.clone());
            continue;
        }
        if pending_value {
            split.config_arguments.push(argument.clone());
            pending_value = false;
            continue;
        }
        if argument == "--" {
            passthrough = true;
            split.command_arguments.push(argument.clone());
            continue;
        }

        match OrthoConfigLoader::process_config_flag(argument.as_os_str()) {
            FlagAction::Include { needs_value } => {
                split.config_arguments.push(argument.clone());
                pending_value = needs_value;
            }
            FlagAction::Skip => split.command_arguments.push(argument.clone()),
        }
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn inline_value_flags_do_not_need_follow_up_value() {
        let result = OrthoConfigLoader::process_config_flag(OsStr::new("--log-filter=debug"));
        assert_eq!(result, FlagAction::Include { needs_value: false });
    }

    #[test]
    fn separate_value_flags_consume_following_argument() {
        let result = OrthoConfigLoader::process_config_flag(OsStr::new("--rules-dir"));
        assert_eq!(result, FlagAction::Include { needs_value: true });
    }

    #[test]
    fn switches_never_consume_a_value() {
        let result =
            OrthoConfigLoader::process_config_flag(OsStr::new("--remove-migration-folder"));
        assert_eq!(result, FlagAction::Include { needs_value: false });
    }

    #[test]
    fn command_flags_are_skipped() {
        let result = OrthoConfigLoader::process_config_flag(OsStr::new("--init-version-name"));
        assert_eq!(result, FlagAction::Skip);
    }

    #[test]
    fn short_flags_are_skipped() {
        let result = OrthoConfigLoader::process_config_flag(OsStr::new("-d"));
        assert_eq!(result, FlagAction::Skip);
    }
}
