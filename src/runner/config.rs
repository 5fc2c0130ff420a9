use std::path::PathBuf;

use clap::{arg, command, value_parser, ValueEnum};

use itergen::interp::echo::RunOptions;
use itergen::lower::{LoweringOptions, PromotionPolicy};

#[derive(Debug, Clone)]
pub struct ItergenConfig {
    pub paths: Vec<PathBuf>,
    pub output: OutputKind,
    pub lowering: LoweringOptions,
    pub run: RunOptions,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CompilationStage {
    Parse,
    Lower,
    #[default]
    Run,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Text,
    Ron,
    Debug,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Promotion {
    /// Promote the locals that live across a suspension point.
    #[default]
    Live,

    /// Promote every local.
    All,
}

impl From<Promotion> for PromotionPolicy {
    fn from(promotion: Promotion) -> Self {
        match promotion {
            Promotion::Live => Self::LiveAcrossSuspension,
            Promotion::All => Self::AllLocals,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoundOutputFormat {
    #[default]
    Ron,
    Debug,
}

impl TryFrom<OutputFormat> for BoundOutputFormat {
    type Error = &'static str;

    fn try_from(format: OutputFormat) -> Result<BoundOutputFormat, Self::Error> {
        match format {
            OutputFormat::Ron => Ok(Self::Ron),
            OutputFormat::Debug => Ok(Self::Debug),
            OutputFormat::Text => Err("this format cannot be used for the current compilation stage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoweredOutputFormat {
    #[default]
    Text,
    Ron,
    Debug,
}

impl From<OutputFormat> for LoweredOutputFormat {
    fn from(format: OutputFormat) -> LoweredOutputFormat {
        match format {
            OutputFormat::Text => Self::Text,
            OutputFormat::Ron => Self::Ron,
            OutputFormat::Debug => Self::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Parse(BoundOutputFormat),
    Lower(LoweredOutputFormat),
    Run,
}

pub fn parse_args_or_exit() -> ItergenConfig {
    use clap::{ArgAction, Command};

    fn command() -> Command {
        command!()
            .arg(
                arg!(files: <FILE> ... "input files with bound programs in RON")
                    .value_parser(value_parser!(PathBuf))
                    .required(true),
            )
            .arg(
                arg!(-s --stage <STAGE> "the stage to stop after")
                    .value_parser(value_parser!(CompilationStage))
                    .required(false),
            )
            .arg(
                arg!(-f --format <FORMAT> "the output format")
                    .value_parser(value_parser!(OutputFormat)),
            )
            .arg(
                arg!(--"no-thread-identity" "assume the target cannot identify the current thread")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                arg!(--promote <POLICY> "which locals to promote to fields")
                    .value_parser(value_parser!(Promotion)),
            )
            .arg(
                arg!(--args <INT> ... "integer arguments passed to every method")
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true),
            )
            .arg(
                arg!(--limit <N> "stop resuming an iterator after N values")
                    .value_parser(value_parser!(usize)),
            )
            .arg(
                arg!(--fuel <N> "the number of blocks a method may execute")
                    .value_parser(value_parser!(u64)),
            )
    }

    fn parse_args() -> Result<ItergenConfig, clap::Error> {
        use clap::error::ErrorKind;

        let mut command = command();
        let matches = command.get_matches_mut();

        let paths = matches
            .get_many::<PathBuf>("files")
            .expect("files")
            .cloned()
            .collect();

        let stage = matches
            .get_one::<CompilationStage>("stage")
            .copied()
            .unwrap_or_default();
        let format = matches.get_one::<OutputFormat>("format").copied();

        let output = match (stage, format) {
            (CompilationStage::Parse, format) => {
                let format = match format {
                    Some(format) => format.try_into(),
                    None => Ok(Default::default()),
                };

                OutputKind::Parse(
                    format.map_err(|msg| command.error(ErrorKind::ValueValidation, msg))?,
                )
            }

            (CompilationStage::Lower, format) => {
                OutputKind::Lower(format.map(Into::into).unwrap_or_default())
            }

            (CompilationStage::Run, None | Some(OutputFormat::Text)) => OutputKind::Run,

            (CompilationStage::Run, Some(_)) => {
                return Err(command.error(
                    ErrorKind::ValueValidation,
                    "this format cannot be used for the current compilation stage",
                ))
            }
        };

        let lowering = LoweringOptions {
            thread_identity: !matches.get_flag("no-thread-identity"),
            promotion: matches
                .get_one::<Promotion>("promote")
                .copied()
                .unwrap_or_default()
                .into(),
        };

        let run = RunOptions {
            args: matches
                .get_many::<i64>("args")
                .map(|args| args.copied().collect())
                .unwrap_or_default(),
            limit: matches.get_one::<usize>("limit").copied(),
            fuel: matches.get_one::<u64>("fuel").copied(),
        };

        Ok(ItergenConfig {
            paths,
            output,
            lowering,
            run,
        })
    }

    match parse_args() {
        Ok(cfg) => cfg,

        Err(e) => {
            e.format(&mut command()).exit();
        }
    }
}
