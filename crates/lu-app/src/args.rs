//! Command-line arguments

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const USAGE: &str = "\
usage: lineup <data.csv> [options]

options:
  --ranking <file>    JSON ranking configuration (columns, sort, filters)
  --config <file>     JSON provider configuration
  --restore <file>    restore rankings from a dump instead of --ranking
  --dump <file>       write the provider dump after sorting
  --top <n>           number of rows to print (default 10)";

const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub data: PathBuf,
    pub ranking: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub restore: Option<PathBuf>,
    pub dump: Option<PathBuf>,
    pub top: usize,
}

impl CliArgs {
    /// Parse arguments from a custom iterator, the program name excluded
    pub fn parse_from<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = None;
        let mut ranking = None;
        let mut config = None;
        let mut restore = None;
        let mut dump = None;
        let mut top = DEFAULT_TOP;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            let mut value = |flag: &str| -> Result<String> {
                args.next()
                    .map(|v| v.as_ref().to_string())
                    .with_context(|| format!("{flag} expects a value"))
            };
            match arg {
                "--ranking" => ranking = Some(PathBuf::from(value(arg)?)),
                "--config" => config = Some(PathBuf::from(value(arg)?)),
                "--restore" => restore = Some(PathBuf::from(value(arg)?)),
                "--dump" => dump = Some(PathBuf::from(value(arg)?)),
                "--top" => {
                    let raw = value(arg)?;
                    top = raw
                        .parse()
                        .with_context(|| format!("--top expects a number, got {raw:?}"))?;
                }
                flag if flag.starts_with('-') => bail!("unknown option {flag}\n\n{USAGE}"),
                path if data.is_none() => data = Some(PathBuf::from(path)),
                extra => bail!("unexpected argument {extra}\n\n{USAGE}"),
            }
        }

        let Some(data) = data else {
            bail!("missing data file\n\n{USAGE}");
        };
        if ranking.is_some() && restore.is_some() {
            bail!("--ranking and --restore are exclusive");
        }
        Ok(Self {
            data,
            ranking,
            config,
            restore,
            dump,
            top,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let args = CliArgs::parse_from([
            "people.csv",
            "--ranking",
            "r.json",
            "--top",
            "3",
            "--dump",
            "out.json",
        ])
        .unwrap();
        assert_eq!(args.data, PathBuf::from("people.csv"));
        assert_eq!(args.ranking, Some(PathBuf::from("r.json")));
        assert_eq!(args.top, 3);
        assert_eq!(args.dump, Some(PathBuf::from("out.json")));
        assert!(args.restore.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(CliArgs::parse_from(Vec::<String>::new()).is_err());
        assert!(CliArgs::parse_from(["a.csv", "--top"]).is_err());
        assert!(CliArgs::parse_from(["a.csv", "--top", "many"]).is_err());
        assert!(CliArgs::parse_from(["a.csv", "--verbose"]).is_err());
        assert!(CliArgs::parse_from(["a.csv", "b.csv"]).is_err());
        assert!(CliArgs::parse_from(["a.csv", "--ranking", "r", "--restore", "d"]).is_err());
    }
}
