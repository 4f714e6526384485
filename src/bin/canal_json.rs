use clap::{Arg, ArgAction, Command};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use sink::{
  codec::{new_event_batch_decoder, EventBatchDecoder, Protocol},
  event::MessageType,
  options::SinkOptions,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let mut cmd = Command::new("canal-json")
    .version("1.0")
    .about("Inspect canal-json changefeed messages")
    .subcommand_required(true)
    .subcommand(
      Command::new("decode")
        .about("Decode one message per line from stdin")
        .arg(
          Arg::new("enable-tidb-extension")
            .long("enable-tidb-extension")
            .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("sink-uri").long("sink-uri").value_parser(Url::parse)),
    );

  let matches = cmd.get_matches_mut();

  match matches.subcommand() {
    Some(("decode", matches)) => {
      let mut protocol = Protocol::CanalJson;
      let mut enable_tidb_extension = matches.get_flag("enable-tidb-extension");

      if let Some(url) = matches.get_one::<Url>("sink-uri") {
        let options = SinkOptions::try_from(url)?;
        options.validate()?;
        protocol = options.protocol;
        enable_tidb_extension |= options
          .params
          .get("enable-tidb-extension")
          .map(|v| v == "true")
          .unwrap_or(false);
      }

      info!(%protocol, enable_tidb_extension, "decoding stdin");
      decode(protocol, enable_tidb_extension).await?;
    }
    _ => unreachable!("subcommand is required"),
  }

  Ok(())
}

async fn decode(protocol: Protocol, enable_tidb_extension: bool) -> Result<(), Box<dyn std::error::Error>> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();

  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }

    let mut decoder = new_event_batch_decoder(protocol, vec![line.into()], enable_tidb_extension)?;
    if let Err(err) = print_events(decoder.as_mut()) {
      error!(error = %err, "skipping message");
    }
  }

  Ok(())
}

fn print_events(decoder: &mut dyn EventBatchDecoder) -> sink::Result<()> {
  loop {
    match decoder.has_next()? {
      (_, false) => return Ok(()),
      (MessageType::Row, true) => println!("{:?}", decoder.next_row_changed_event()?),
      (MessageType::Ddl, true) => println!("{:?}", decoder.next_ddl_event()?),
      (MessageType::Resolved, true) => println!("resolved {}", decoder.next_resolved_event()?),
      (MessageType::Unknown, true) => return Ok(()),
    }
  }
}
