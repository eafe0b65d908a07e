//! `truthframe` binary: publish documents as frames and reassemble them.

mod cli;

use std::{
    error::Error,
    fs,
    io::{self, Write},
    process::ExitCode,
};

use clap::Parser;
use cli::{Cli, Command, IngestArgs, PublishArgs};
use truthframe::{
    Assembler,
    AssemblyStatus,
    Publisher,
    TruthConfig,
    TruthError,
    classify::ClassifySession,
    envelope::EnvelopeSettings,
    publish::PublishOverrides,
    registry::Registry,
    serializer::{AutoDetectSerializer, PayloadSerializer},
};

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    match run(cli, &mut stdout.lock()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Run one command, returning `false` when some input was rejected.
fn run(cli: Cli, out: &mut impl Write) -> CliResult<bool> {
    let config = TruthConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Publish(args) => publish(&config, args, out).map(|()| true),
        Command::Ingest(args) => ingest(&config, &args, out),
    }
}

fn publish(config: &TruthConfig, args: PublishArgs, out: &mut impl Write) -> CliResult<()> {
    let text = fs::read_to_string(&args.input)
        .map_err(|err| format!("failed to read {}: {err}", args.input.display()))?;
    let payload = AutoDetectSerializer::default().decode(&text)?;

    let registry = Registry::with_defaults();
    let runtime = EnvelopeSettings {
        prefix: args.prefix,
        version: args.envelope_version,
    };
    let params = config.envelope_params(runtime);
    let suite = registry.suite(
        args.serializer.as_deref().unwrap_or(&config.codec.serializer),
        args.transport.as_deref().unwrap_or(&config.codec.transport),
        args.envelope.as_deref().unwrap_or(&config.codec.envelope),
        &params,
    )?;

    let overrides = PublishOverrides {
        by: args.by.as_deref().map(str::parse).transpose()?,
        count: args.count,
        size: args.size,
    };
    let options = config.publish.merge(&overrides);
    let output = Publisher::from(suite).publish_output(&payload, &args.code, &options)?;
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn ingest(config: &TruthConfig, args: &IngestArgs, out: &mut impl Write) -> CliResult<bool> {
    let text = fs::read_to_string(&args.file)
        .map_err(|err| format!("failed to read {}: {err}", args.file.display()))?;

    let registry = Registry::with_defaults();
    let params = config.envelope_params(EnvelopeSettings::default());
    let suite = config.suite(&registry, EnvelopeSettings::default())?;
    let assembler = Assembler::new(
        config.store.open()?,
        suite.serializer,
        suite.transport,
        registry.envelopes(&params),
    );

    let mut session = match &args.code {
        Some(code) => ClassifySession::for_code(&assembler, code.clone()),
        None => ClassifySession::new(&assembler),
    };
    let mut clean = true;
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match session.add_line(line) {
            Ok(status) => writeln!(out, "{}", status_line(&status))?,
            Err(TruthError::CodeMismatch { expected, found }) => {
                clean = false;
                tracing::warn!(line = number + 1, "unexpected code {found}, expecting {expected}");
            }
            Err(err) => {
                clean = false;
                tracing::error!(line = number + 1, "{err}");
            }
        }
    }

    let Some(code) = session.code().map(str::to_owned) else {
        return Ok(false);
    };
    if !session.is_complete() {
        tracing::warn!("{code} is incomplete");
        return Ok(false);
    }
    if args.print {
        let payload = assembler.assemble(&code)?;
        serde_json::to_writer_pretty(&mut *out, &payload)?;
        writeln!(out)?;
    }
    if let Some(path) = &args.out {
        let artifact = assembler.artifact(&code)?;
        fs::write(path, artifact.content)
            .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
        tracing::info!(content_type = artifact.content_type, "wrote {}", path.display());
    }
    assembler.forget(&code)?;
    Ok(clean)
}

fn status_line(status: &AssemblyStatus) -> String {
    let missing: Vec<String> = status.missing.iter().map(u32::to_string).collect();
    format!(
        "code={} total={} received={} missing=[{}]",
        status.code,
        status.total,
        status.received,
        missing.join(",")
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use tempfile::TempDir;

    use super::{Cli, run};

    fn invoke(args: &[&str]) -> (bool, String) {
        let mut out = Vec::new();
        let clean = run(Cli::parse_from(args), &mut out).expect("run");
        (clean, String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn publish_then_ingest_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("doc.yaml");
        fs::write(&input, "title: ballot\nvotes: [1, 2, 3]\n").expect("write");
        let input = input.to_str().expect("path");

        let (_, published) = invoke(&["truthframe", "publish", "-i", input, "--code", "DEMO-001", "--count", "2"]);
        let output: serde_json::Value = serde_json::from_str(&published).expect("json");
        let lines: Vec<&str> = output["lines"]
            .as_array()
            .expect("lines")
            .iter()
            .filter_map(|line| line.as_str())
            .collect();
        assert_eq!(lines.len(), 2);

        let scans = dir.path().join("scans.txt");
        fs::write(&scans, format!("{}\n\n{}\n", lines[1], lines[0])).expect("write");
        let artifact = dir.path().join("doc.json");
        let (clean, report) = invoke(&[
            "truthframe",
            "ingest",
            scans.to_str().expect("path"),
            "--print",
            "--out",
            artifact.to_str().expect("path"),
        ]);
        assert!(clean);
        assert!(report.starts_with("code=DEMO-001 total=2 received=1 missing=[1]\n"));
        assert!(report.contains("code=DEMO-001 total=2 received=2 missing=[]"));
        assert!(report.contains("\"title\": \"ballot\""));
        assert_eq!(
            fs::read_to_string(artifact).expect("artifact"),
            r#"{"title":"ballot","votes":[1,2,3]}"#
        );
    }

    #[test]
    fn ingest_reports_foreign_codes_as_failure() {
        let dir = TempDir::new().expect("tempdir");
        let scans = dir.path().join("scans.txt");
        fs::write(&scans, "ER|v1|A|1/1|e30\nER|v1|B|1/1|e30\n").expect("write");
        let (clean, report) = invoke(&["truthframe", "ingest", scans.to_str().expect("path")]);
        assert!(!clean);
        assert_eq!(report, "code=A total=1 received=1 missing=[]\n");
    }

    #[test]
    fn config_file_selects_url_envelope() {
        let dir = TempDir::new().expect("tempdir");
        let config = dir.path().join("truth.toml");
        fs::write(&config, "[codec]\nenvelope = \"url\"\n[envelope]\nprefix = \"BAL\"\n").expect("write");
        let input = dir.path().join("doc.json");
        fs::write(&input, r#"{"a":1}"#).expect("write");

        let (_, published) = invoke(&[
            "truthframe",
            "publish",
            "--config",
            config.to_str().expect("path"),
            "-i",
            input.to_str().expect("path"),
            "--code",
            "X",
            "--count",
            "1",
        ]);
        let output: serde_json::Value = serde_json::from_str(&published).expect("json");
        let url = output["urls"][0].as_str().expect("url");
        assert!(url.starts_with("truth://v1/BAL/X/1/1?c="), "{url}");
    }
}
