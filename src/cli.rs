use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Translate one text (the default when no subcommand is given)
    Translate(TranslateArgs),

    /// Translate line by line; a new line replaces the running translation
    Interactive {
        /// Also keep a self-refreshing HTML page of the output
        #[arg(long)]
        html_out: Option<PathBuf>,

        /// Do not store finished translations
        #[arg(long)]
        no_history: bool,
    },

    /// List the models available on the server
    Models,

    /// Inspect or edit the stored history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum HistoryAction {
    /// Show stored translations, newest first
    List {
        /// Print the stored HTML instead of converting it back to markdown
        #[arg(long)]
        raw: bool,
    },

    /// Delete the entry with the given timestamp
    Delete { timestamp: String },

    /// Delete every entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct TranslateArgs {
    /// Text to translate (read from stdin when omitted)
    pub text: Option<String>,

    /// Also keep a self-refreshing HTML page of the output
    #[arg(long)]
    pub html_out: Option<PathBuf>,

    /// Record the server's responses to a file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Play back recorded responses instead of contacting the server
    #[arg(long)]
    pub playback: Option<PathBuf>,

    /// Fast playback mode - ignore chunk timing when playing recordings
    #[arg(long)]
    pub fast_playback: bool,

    /// Do not store the finished translation
    #[arg(long)]
    pub no_history: bool,
}

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Option<Mode>,

    #[command(flatten)]
    pub translate: TranslateArgs,

    /// Base URL of the Ollama server (remembered for later runs)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Model to use (remembered for later runs)
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args_parsing() {
        let args = Args::try_parse_from(["test"]).expect("Failed to parse default args");

        assert!(args.mode.is_none());
        assert!(args.translate.text.is_none());
        assert_eq!(args.verbose, 0);
        assert!(args.api_url.is_none());
        assert!(args.model.is_none());
        assert!(!args.translate.no_history);
    }

    #[test]
    fn test_bare_text_translates() {
        let args = Args::try_parse_from(["test", "-m", "llama3.2:3b", "Bonjour"])
            .expect("Failed to parse text");
        assert!(args.mode.is_none());
        assert_eq!(args.translate.text.as_deref(), Some("Bonjour"));
        assert_eq!(args.model.as_deref(), Some("llama3.2:3b"));
    }

    #[test]
    fn test_translate_subcommand() {
        let args = Args::try_parse_from([
            "test",
            "translate",
            "--html-out",
            "out.html",
            "--api-url",
            "http://host:11434",
            "Hallo",
        ])
        .expect("Failed to parse translate args");

        match args.mode {
            Some(Mode::Translate(translate)) => {
                assert_eq!(translate.text.as_deref(), Some("Hallo"));
                assert_eq!(translate.html_out, Some(PathBuf::from("out.html")));
            }
            _ => panic!("Expected translate mode"),
        }
        assert_eq!(args.api_url.as_deref(), Some("http://host:11434"));
    }

    #[test]
    fn test_verbose_flag_counting() {
        let args = Args::try_parse_from(["test", "-vv"]).expect("Failed to parse verbose args");
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["test", "models", "-v"])
            .expect("Failed to parse verbose args");
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_history_subcommands() {
        let args = Args::try_parse_from(["test", "history", "delete", "2026-10-19T12:00:00.000Z"])
            .expect("Failed to parse history args");
        match args.mode {
            Some(Mode::History { action }) => assert_eq!(
                action,
                HistoryAction::Delete {
                    timestamp: "2026-10-19T12:00:00.000Z".to_string()
                }
            ),
            _ => panic!("Expected history mode"),
        }

        let args = Args::try_parse_from(["test", "history", "clear", "--yes"])
            .expect("Failed to parse history args");
        assert!(matches!(
            args.mode,
            Some(Mode::History {
                action: HistoryAction::Clear { yes: true }
            })
        ));
    }
}
