//! External command surfaces: the deep-link activation URL and the
//! line-based control input read by the CLI.
//!
//! | Line                  | Command                          |
//! |-----------------------|----------------------------------|
//! | `start` / `stop`      | `Start` / `Stop`                 |
//! | `toggle`              | `Toggle`                         |
//! | `load <model>`        | `LoadModel` (storage key)        |
//! | `unload`              | `UnloadModel`                    |
//! | `download <model>`    | `DownloadModel`                  |
//! | `cancel`              | `CancelDownload`                 |
//! | `clear`               | `ClearTranscript`                |
//! | `tone <tone>`         | `SetTone`                        |
//! | `<scheme>://<host>`   | `Toggle`                         |

use thiserror::Error;

use crate::config::ActivationConfig;
use crate::engine::{ModelSize, Tone};
use crate::session::SessionCommand;

/// `true` if `url` is this app's activation deep link.
///
/// Scheme and host compare case-insensitively; a trailing slash, path, or
/// query is allowed.
pub fn parse_activation(url: &str, config: &ActivationConfig) -> bool {
    let Some((scheme, rest)) = url.trim().split_once("://") else {
        return false;
    };
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    scheme.eq_ignore_ascii_case(&config.scheme) && host.eq_ignore_ascii_case(&config.host)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
}

/// Parser for one line of control input.
pub struct ControlLine;

impl ControlLine {
    /// Parse a line. Blank lines yield `Ok(None)`.
    pub fn parse(
        line: &str,
        activation: &ActivationConfig,
    ) -> Result<Option<SessionCommand>, ControlError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.contains("://") {
            return if parse_activation(line, activation) {
                Ok(Some(SessionCommand::Toggle))
            } else {
                Err(ControlError::Unknown(line.to_string()))
            };
        }

        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();

        let command = match verb.as_str() {
            "start" => SessionCommand::Start,
            "stop" => SessionCommand::Stop,
            "toggle" => SessionCommand::Toggle,
            "unload" => SessionCommand::UnloadModel,
            "cancel" => SessionCommand::CancelDownload,
            "clear" => SessionCommand::ClearTranscript,
            "load" => SessionCommand::LoadModel(model_arg("load", arg)?),
            "download" => SessionCommand::DownloadModel(model_arg("download", arg)?),
            "tone" => {
                let tone = arg
                    .ok_or(ControlError::MissingArgument("tone"))?
                    .parse::<Tone>()
                    .map_err(ControlError::InvalidArgument)?;
                SessionCommand::SetTone(tone)
            }
            _ => return Err(ControlError::Unknown(line.to_string())),
        };
        Ok(Some(command))
    }
}

fn model_arg(verb: &'static str, arg: Option<&str>) -> Result<ModelSize, ControlError> {
    arg.ok_or(ControlError::MissingArgument(verb))?
        .parse::<ModelSize>()
        .map_err(|e| ControlError::InvalidArgument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<SessionCommand>, ControlError> {
        ControlLine::parse(line, &ActivationConfig::default())
    }

    #[test]
    fn activation_url_matches_scheme_and_host() {
        let cfg = ActivationConfig::default();
        assert!(parse_activation("voicedictation://record", &cfg));
        assert!(parse_activation("VoiceDictation://Record/", &cfg));
        assert!(parse_activation("voicedictation://record?source=keyboard", &cfg));
        assert!(!parse_activation("voicedictation://settings", &cfg));
        assert!(!parse_activation("https://record", &cfg));
        assert!(!parse_activation("record", &cfg));
    }

    #[test]
    fn simple_verbs() {
        assert_eq!(parse("start"), Ok(Some(SessionCommand::Start)));
        assert_eq!(parse("  STOP "), Ok(Some(SessionCommand::Stop)));
        assert_eq!(parse("toggle"), Ok(Some(SessionCommand::Toggle)));
        assert_eq!(parse("cancel"), Ok(Some(SessionCommand::CancelDownload)));
        assert_eq!(parse("clear"), Ok(Some(SessionCommand::ClearTranscript)));
        assert_eq!(parse("unload"), Ok(Some(SessionCommand::UnloadModel)));
        assert_eq!(parse(""), Ok(None));
    }

    #[test]
    fn verbs_with_arguments() {
        assert_eq!(
            parse("load large_turbo"),
            Ok(Some(SessionCommand::LoadModel(ModelSize::LargeTurbo)))
        );
        assert_eq!(
            parse("download tiny"),
            Ok(Some(SessionCommand::DownloadModel(ModelSize::Tiny)))
        );
        assert_eq!(parse("tone formal"), Ok(Some(SessionCommand::SetTone(Tone::Formal))));
        assert_eq!(parse("load"), Err(ControlError::MissingArgument("load")));
        assert!(matches!(parse("tone shouty"), Err(ControlError::InvalidArgument(_))));
        assert!(matches!(parse("download huge"), Err(ControlError::InvalidArgument(_))));
    }

    #[test]
    fn deep_link_toggles() {
        assert_eq!(
            parse("voicedictation://record"),
            Ok(Some(SessionCommand::Toggle))
        );
        assert!(matches!(parse("other://record"), Err(ControlError::Unknown(_))));
        assert!(matches!(parse("dance"), Err(ControlError::Unknown(_))));
    }
}
