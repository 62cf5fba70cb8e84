use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tracing::debug;

use persist_backend::{ClassIdentity, ConflictReport};
use persist_record::{inspect, RecordSummary};
use persist_types::Oid;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Oid(action) => cmd_oid(action, cli.format),
        Command::Inspect(args) => cmd_inspect(args, cli.format),
        Command::Conflict(args) => cmd_conflict(args, cli.format),
    }
}

fn cmd_oid(action: OidAction, format: OutputFormat) -> anyhow::Result<()> {
    let (value, bytes) = match action {
        OidAction::Encode { value } => (value, encode_oid(value)),
        OidAction::Decode { hex } => {
            let value = decode_oid(&hex)?;
            (value, encode_oid(value))
        }
    };
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "value": value, "bytes": bytes, "oid": Oid::new(value) });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => println!("{} = {}", value.to_string().bold(), bytes.cyan()),
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = read_record_file(&args.record)?;
    let summary = inspect(&data)
        .with_context(|| format!("malformed record in {}", args.record.display()))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print!("{}", render_summary(&summary)),
    }
    Ok(())
}

fn cmd_conflict(args: ConflictArgs, format: OutputFormat) -> anyhow::Result<()> {
    let oid = Oid::from_hex(&args.oid).with_context(|| format!("invalid oid `{}`", args.oid))?;
    let committed = read_record_file(&args.committed)?;
    let new = read_record_file(&args.new)?;
    let report = ConflictReport::from_records(oid, &committed, &new);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("{}", report.to_string().red());
            for (side, identity) in [("committed", &report.committed), ("new", &report.attempted)] {
                if let ClassIdentity::Unreadable { reason } = identity {
                    println!("  {} record unreadable: {}", side.yellow(), reason);
                }
            }
        }
    }
    Ok(())
}

/// The 8-byte big-endian form of `value` as lowercase hex.
pub fn encode_oid(value: u64) -> String {
    hex::encode(persist_types::encode(value))
}

/// Parse 8 hex-encoded bytes (optional `0x` prefix) back into an integer.
pub fn decode_oid(text: &str) -> anyhow::Result<u64> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(digits).with_context(|| format!("invalid hex `{text}`"))?;
    Ok(persist_types::decode(&bytes)?)
}

pub fn read_record_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    debug!(path = %path.display(), size = data.len(), "read record file");
    Ok(data)
}

pub fn render_summary(summary: &RecordSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Class: {}\n", summary.class.to_string().cyan().bold()));
    out.push_str(&format!("Size: {} bytes\n", summary.size));
    out.push_str(&format!("Attributes ({}):\n", summary.attributes.len()));
    for name in &summary.attributes {
        out.push_str(&format!("  {name}\n"));
    }
    if !summary.references.is_empty() {
        out.push_str(&format!("References ({}):\n", summary.references.len()));
        for oid in &summary.references {
            out.push_str(&format!("  {}\n", oid.to_string().yellow()));
        }
    }
    if !summary.literal_classes.is_empty() {
        out.push_str("Class values:\n");
        for class in &summary.literal_classes {
            out.push_str(&format!("  {class}\n"));
        }
    }
    if !summary.inline_classes.is_empty() {
        out.push_str("Inline instances:\n");
        for class in &summary.inline_classes {
            out.push_str(&format!("  {class}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use persist_record::RecordBuilder;
    use persist_types::ClassRef;
    use std::io::Write;

    fn record() -> Vec<u8> {
        let mut b = RecordBuilder::new(&ClassRef::new("app.models", "Account")).unwrap();
        b.begin_state(2);
        b.name("owner").unwrap();
        b.persistent_ref(Oid::new(7));
        b.name("kind").unwrap();
        b.class_literal(&ClassRef::new("app.kinds", "Savings")).unwrap();
        b.finish()
    }

    #[test]
    fn oid_encode_and_decode() {
        assert_eq!(encode_oid(1), "0000000000000001");
        assert_eq!(encode_oid(1 << 32), "0000000100000000");
        assert_eq!(decode_oid("0000000100000000").unwrap(), 1 << 32);
        assert_eq!(decode_oid("0x0000000000000001").unwrap(), 1);
    }

    #[test]
    fn oid_decode_rejects_bad_input() {
        assert!(decode_oid("0001").is_err());
        assert!(decode_oid("zz00000000000000").is_err());
    }

    #[test]
    fn reads_record_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&record()).unwrap();
        let data = read_record_file(file.path()).unwrap();
        assert_eq!(data, record());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_record_file(&dir.path().join("absent.rec")).unwrap_err();
        assert!(err.to_string().contains("absent.rec"));
    }

    #[test]
    fn summary_lists_everything() {
        colored::control::set_override(false);
        let text = render_summary(&inspect(&record()).unwrap());
        assert!(text.contains("Class: app.models.Account"));
        assert!(text.contains("owner"));
        assert!(text.contains("0x0000000000000007"));
        assert!(text.contains("app.kinds.Savings"));
    }
}
