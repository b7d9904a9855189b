use crate::support::print_json;
use locus_dispatch::LocusConfig;
use std::process;

pub fn run_show(path: Option<String>, json_output: bool) {
    let config = match &path {
        Some(path) => LocusConfig::load(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        }),
        None => LocusConfig::default(),
    };

    if json_output {
        print_json(&config);
        return;
    }
    match toml::to_string_pretty(&config) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render config: {e}");
            process::exit(1);
        }
    }
}
