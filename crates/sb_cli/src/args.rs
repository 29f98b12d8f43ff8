#[derive(Debug)]
pub(crate) struct CliArgs {
    pub debug: bool,
    pub script: Option<String>,
    pub script_args: Vec<String>,
}

pub(crate) fn usage() -> &'static str {
    "Usage: sbus [DEBUG] [script [args...]]"
}

/// `DEBUG` is only recognized as the very first token; anywhere else it is
/// an ordinary script argument.
pub(crate) fn parse_args() -> Result<CliArgs, String> {
    parse_from(std::env::args().skip(1).collect())
}

pub(crate) fn parse_from(mut argv: Vec<String>) -> Result<CliArgs, String> {
    let mut debug = false;
    if argv.first().map(String::as_str) == Some("DEBUG") {
        debug = true;
        argv.remove(0);
    }
    if let Some(first) = argv.first() {
        if first.starts_with("--") {
            return Err(format!("Unknown option: {first}\n{}", usage()));
        }
    }
    let script = if argv.is_empty() {
        None
    } else {
        Some(argv.remove(0))
    };
    Ok(CliArgs {
        debug,
        script,
        script_args: argv,
    })
}
