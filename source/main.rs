use std::{fs, io, path, sync::Arc};

use anyhow::Context as _;
use clap::Parser as _;

#[derive(clap::Parser)]
struct Arguments {
  #[arg(long = "config", help = "Path to a filter chain JSON configuration")]
  config: path::PathBuf,
  #[arg(
    long = "state-directory",
    help = "Directory the Bayesian filter persists its word database in (defaults to $XDG_RUNTIME_DIR)"
  )]
  state_directory: Option<path::PathBuf>,
  #[arg(long = "subject", help = "Message Subject header", default_value = "")]
  subject: String,
  #[arg(long = "body", help = "Path to a file containing the message body")]
  body: Option<path::PathBuf>,
  #[arg(long = "peer", help = "Delivery path, nearest hop first", num_args = 0..)]
  peer: Vec<String>,
  #[clap(flatten)]
  verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

fn main() -> anyhow::Result<()> {
  let arguments = Arguments::parse();

  let encoder = Box::new(log4rs::encode::pattern::PatternEncoder::new("{d(%F %T)} {l} {t} - {m}{n}"));
  log4rs::init_config(
    log4rs::config::Config::builder()
      .appender(
        log4rs::config::Appender::builder()
          .filter(Box::new(log4rs::filter::threshold::ThresholdFilter::new(
            arguments.verbose.log_level_filter(),
          )))
          .build("console", Box::new(log4rs::append::console::ConsoleAppender::builder().encoder(encoder).build())),
      )
      .build(log4rs::config::Root::builder().appenders(["console"]).build(log::LevelFilter::Trace))?,
  )?;

  let config: serde_json::Value = serde_json::from_reader(io::BufReader::new(fs::File::open(&arguments.config)?))?;
  let body = match &arguments.body {
    Some(path) => fs::read(path)?,
    None => Vec::new(),
  };

  let state_directory = match arguments.state_directory {
    Some(directory) => directory,
    None => path::PathBuf::from(std::env::var("XDG_RUNTIME_DIR").context("--state-directory not given and $XDG_RUNTIME_DIR is not set")?),
  };
  let context = triage::FilterContext {
    decoder: Arc::new(triage::DefaultDecoder),
    directory: state_directory,
    timer: Arc::new(triage::ThreadTimer),
    spawn: Arc::new(triage::ThreadSpawn),
  };
  let chain = triage::build_chain(&config, &context)?;

  let mut headers = triage::Headers::new();
  headers.insert("subject", &arguments.subject);
  let message = triage::Message::new(headers, body, arguments.peer);

  let (sender, receiver) = std::sync::mpsc::channel();
  let (immediate, task) = chain.evaluate(message, move |verdict| {
    let _ = sender.send(verdict);
  });
  println!("immediate verdict: {immediate:?}");

  task.join();
  match receiver.try_recv() {
    Ok(verdict) => println!("final verdict: {verdict:?}"),
    Err(_) => println!("final verdict: unchanged"),
  }

  Ok(())
}
