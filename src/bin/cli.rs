use report_console::cache::{CachePort, FileCache, MemoryCache};
use report_console::config::ConsoleConfig;
use report_console::downloader::{
    HeaderTrailer, OutputFormat, parse_report_rows, to_csv, to_flat_file, to_xlsx,
};
use report_console::loader::{DropdownSource, HierarchyLoader, StaticSource};
use report_console::report::{
    BUREAU_REPORT_TYPES, DateRange, ReportFilters, ReportProfile, builtin_profile, builtin_profiles,
};
use report_console::{HierarchyResolver, LevelKind, SelectionState};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

fn print_help() {
    println!("Commands:");
    println!("  q: Quit");
    println!("  show: Show the current selection");
    println!("  options <level>: List the options for cluster, region, area or branch");
    println!("  select <level> <id>: Select an entity at a level");
    println!("  clear <level>: Clear a level and everything below it");
    println!("  statuses: List status options");
    println!("  status <id>: Toggle a status filter");
    println!("  dates [YYYY-MM-DD] <YYYY-MM-DD>: Set the date range, the start may be left open");
    println!("  set <field> [value]: Set or remove an extra body field, e.g. set reportType {}", BUREAU_REPORT_TYPES[0]);
    println!("  body: Print the report request body");
    println!("  generate [file]: Generate the report through the API and save the download");
    println!("  export <rows.json> [file]: Write a rows file in the report's download format (.csv for CSV)");
    println!("  disable_output / enable_output: Toggle printing the selection after each command");
}

fn dropdown_source(
    payload_path: Option<&String>,
    config: &ConsoleConfig,
) -> Result<Arc<dyn DropdownSource>, Box<dyn std::error::Error>> {
    if let Some(path) = payload_path {
        let payload: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        return Ok(Arc::new(StaticSource::new(payload)));
    }
    api_source(config)
}

#[cfg(feature = "web")]
fn api_source(config: &ConsoleConfig) -> Result<Arc<dyn DropdownSource>, Box<dyn std::error::Error>> {
    Ok(Arc::new(report_console::client::ApiClient::new(config.clone())))
}

#[cfg(not(feature = "web"))]
fn api_source(_config: &ConsoleConfig) -> Result<Arc<dyn DropdownSource>, Box<dyn std::error::Error>> {
    Err("no payload file given and the `web` feature is disabled".into())
}

#[cfg(feature = "web")]
async fn download(
    config: &ConsoleConfig,
    profile: &ReportProfile,
    body: &serde_json::Value,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let client = report_console::client::ApiClient::new(config.clone());
    Ok(client.download(profile, body).await?)
}

#[cfg(not(feature = "web"))]
async fn download(
    _config: &ConsoleConfig,
    _profile: &ReportProfile,
    _body: &serde_json::Value,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    Err("generating reports needs the `web` feature".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let s = Instant::now();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <report> [payload.json]", args[0]);
        let names: Vec<String> = builtin_profiles().into_iter().map(|p| p.name).collect();
        eprintln!("Reports: {}", names.join(", "));
        return Ok(());
    }

    let Some(profile) = builtin_profile(&args[1]) else {
        eprintln!("Error: Unknown report '{}'", args[1]);
        return Ok(());
    };

    let config = ConsoleConfig::from_env();
    let cache: Arc<dyn CachePort> = match &config.cache_dir {
        Some(dir) => Arc::new(FileCache::new(dir)?),
        None => Arc::new(MemoryCache::new()),
    };
    let source = dropdown_source(args.get(2), &config)?;

    let loader = HierarchyLoader::new(profile.clone(), source, cache).with_ttl(config.cache_ttl);
    let index = loader.index().await;
    for issue in index.issues() {
        println!("warning: {}", issue);
    }

    let resolver = HierarchyResolver::with_levels(&index, profile.levels.clone());
    let mut selection = SelectionState::new();
    let mut filters = ReportFilters::default();
    let mut status = String::from("ok");
    let mut show = true;
    let mut start_time = Instant::now();

    loop {
        if show {
            let parts: Vec<String> = selection
                .iter()
                .map(|(level, id)| format!("{}={}", level, id))
                .collect();
            println!("[{}] {}", profile.name, parts.join(" "));
        }

        print!("[{:.1}] ({}) > ", start_time.elapsed().as_secs_f64(), status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        if command.is_empty() {
            status = String::from("invalid command");
            continue;
        }

        let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));
        let rest = rest.trim();

        match verb {
            "q" => break,
            "help" => {
                print_help();
                status = String::from("ok");
            }
            "show" => {
                for level in profile.levels.iter() {
                    println!("  {}: {}", level, selection.get(level).unwrap_or("-"));
                }
                status = String::from("ok");
            }
            "disable_output" => {
                show = false;
                status = String::from("ok");
            }
            "enable_output" => {
                show = true;
                status = String::from("ok");
            }
            "options" => match rest.parse::<LevelKind>() {
                Ok(level) => {
                    for entity in resolver.options(&selection, level) {
                        println!("  {}  {}", entity.id, entity.label);
                    }
                    status = String::from("ok");
                }
                Err(e) => status = e,
            },
            "select" | "clear" => {
                let (level_name, id) = rest.split_once(' ').unwrap_or((rest, ""));
                let level = match level_name.parse::<LevelKind>() {
                    Ok(level) => level,
                    Err(e) => {
                        status = e;
                        continue;
                    }
                };
                let id = if verb == "clear" { None } else { Some(id.trim()) };
                match resolver.select(&selection, level, id) {
                    Ok(next) => {
                        selection = next;
                        status = String::from("ok");
                    }
                    Err(e) => status = e.to_string(),
                }
            }
            "statuses" => {
                for option in resolver.status_options() {
                    let mark = if filters.statuses.contains(&option.id) { "*" } else { " " };
                    println!(" {} {}  {}", mark, option.id, option.label);
                }
                status = String::from("ok");
            }
            "status" => {
                if let Some(pos) = filters.statuses.iter().position(|s| s == rest) {
                    filters.statuses.remove(pos);
                    status = String::from("ok");
                } else if resolver.status_options().iter().any(|o| o.id == rest) {
                    filters.statuses.push(rest.to_string());
                    status = String::from("ok");
                } else {
                    status = String::from("unknown status");
                }
            }
            "dates" => {
                let (start, end) = rest.split_once(' ').unwrap_or(("", rest));
                match DateRange::parse(start, end) {
                    Ok(range) => {
                        filters.date_range = Some(range);
                        status = String::from("ok");
                    }
                    Err(e) => status = e.to_string(),
                }
            }
            "set" => {
                let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
                if key.is_empty() {
                    status = String::from("invalid command");
                } else if value.trim().is_empty() {
                    filters.extra.remove(key);
                    status = String::from("ok");
                } else {
                    filters
                        .extra
                        .insert(key.to_string(), serde_json::Value::String(value.trim().to_string()));
                    status = String::from("ok");
                }
            }
            "generate" => {
                let out_path = if rest.is_empty() {
                    profile.download_name()
                } else {
                    rest.to_string()
                };
                let written = match profile.request_body(&index, &selection, &filters) {
                    Ok(body) => download(&config, &profile, &body)
                        .await
                        .and_then(|bytes| Ok(fs::write(&out_path, bytes)?)),
                    Err(e) => Err(e.into()),
                };
                status = match written {
                    Ok(()) => format!("wrote {}", out_path),
                    Err(e) => e.to_string(),
                };
            }
            "body" => match profile.request_body(&index, &selection, &filters) {
                Ok(body) => {
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    status = String::from("ok");
                }
                Err(e) => status = e.to_string(),
            },
            "export" => {
                let (rows_path, out_path) = rest.split_once(' ').unwrap_or((rest, ""));
                let out_path = if out_path.trim().is_empty() {
                    profile.download_name()
                } else {
                    out_path.trim().to_string()
                };
                status = match export(&profile.output, rows_path, &out_path) {
                    Ok(()) => format!("wrote {}", out_path),
                    Err(e) => e.to_string(),
                };
            }
            _ => {
                status = String::from("invalid command");
            }
        }
    }

    let e = s.elapsed().as_secs_f64();
    println!("Total elapsed time: {:.1} seconds", e);

    Ok(())
}

fn export(
    output: &OutputFormat,
    rows_path: &str,
    out_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let response: serde_json::Value = serde_json::from_str(&fs::read_to_string(rows_path)?)?;
    let rows = parse_report_rows(response)?;

    match output {
        OutputFormat::Xlsx(layout) if out_path.ends_with(".csv") => {
            fs::write(out_path, to_csv(&rows, layout))?
        }
        OutputFormat::Xlsx(layout) => fs::write(out_path, to_xlsx(&rows, layout)?)?,
        OutputFormat::FlatFile(layout) => {
            fs::write(out_path, to_flat_file(&rows, layout, &HeaderTrailer::default()))?
        }
    }

    Ok(())
}
