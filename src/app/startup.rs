pub(crate) const USAGE: &str = "\
Usage: sniptex [--daemon | --quit | --help]

  (no flag)   open the selection overlay, starting the resident instance if needed
  --daemon    start the resident instance without opening the overlay
  --quit      ask the resident instance to exit
  --help      show this message

Bind `sniptex` to a global shortcut in your desktop or compositor settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupCommand {
    #[default]
    Snip,
    Daemon,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    pub command: StartupCommand,
    program: String,
}

impl StartupConfig {
    pub fn from_args() -> Self {
        Self::parse(std::env::args())
    }

    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let program = args.next().unwrap_or_else(|| "sniptex".to_string());
        let mut command = StartupCommand::Snip;

        for arg in args {
            match arg.as_str() {
                "--daemon" | "-d" => command = StartupCommand::Daemon,
                "--quit" | "-q" => command = StartupCommand::Quit,
                "--help" | "-h" => {
                    command = StartupCommand::Help;
                    break;
                }
                unknown => tracing::warn!(argument = unknown, "ignoring unknown argument"),
            }
        }

        Self { command, program }
    }

    /// Only argv[0] goes to GTK so our flags never fail its option parsing.
    pub(crate) fn gtk_args(&self) -> Vec<String> {
        vec![self.program.clone()]
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self::parse(["sniptex"])
    }
}
