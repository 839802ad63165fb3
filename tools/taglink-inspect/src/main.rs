// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

mod values;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use taglink::schema::yaml::Schema;
use taglink::{
    describe, read_package, write_package, ArchiveContext, ArchiveReader, FormatVersion, Instance, PropertyTag,
    TaglinkConfig, TypeRegistry, PACKAGE_MAGIC,
};

#[derive(Parser)]
#[command(name = "taglink-inspect")]
#[command(about = "Inspect type layouts and tagged property packages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the linked layout of schema types
    Layout {
        /// Schema YAML file
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,

        /// Only this type (all types if omitted)
        #[arg(short = 't', long = "type", value_name = "NAME")]
        type_name: Option<String>,
    },

    /// Build an instance from a values file and write it as a package
    Encode {
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,

        #[arg(short = 't', long = "type", value_name = "NAME")]
        type_name: String,

        /// Property values YAML (name: text form)
        #[arg(value_name = "VALUES")]
        values: PathBuf,

        /// Runtime configuration (archive settings, redirects)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output package file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Load a package against a schema and print its properties
    Decode {
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(value_name = "PACKAGE")]
        package: PathBuf,

        /// Exit with an error when the load reported diagnostics
        #[arg(long)]
        strict: bool,
    },

    /// List the top-level records of a package without a schema
    Dump {
        #[arg(value_name = "PACKAGE")]
        package: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Layout { schema, type_name } => cmd_layout(&schema, type_name.as_deref())?,
        Commands::Encode {
            schema,
            type_name,
            values,
            config,
            output,
        } => cmd_encode(&schema, &type_name, &values, config.as_deref(), &output)?,
        Commands::Decode {
            schema,
            config,
            package,
            strict,
        } => cmd_decode(&schema, config.as_deref(), &package, strict)?,
        Commands::Dump { package } => cmd_dump(&package)?,
    }

    Ok(())
}

/// Registry built from `schema`, with `config` applied, plus the archive
/// settings to use.
fn load_registry(schema: &Path, config: Option<&Path>) -> anyhow::Result<(TypeRegistry, ArchiveContext)> {
    let schema = Schema::load(schema).with_context(|| format!("loading schema {}", schema.display()))?;
    let mut registry = TypeRegistry::new();
    schema.declare(&mut registry)?;
    let ctx = match config {
        Some(path) => {
            let config = TaglinkConfig::load(path).with_context(|| format!("loading config {}", path.display()))?;
            config.apply(&mut registry)?;
            config.archive_context()
        }
        None => ArchiveContext::new(),
    };
    registry.link_all()?;
    log::info!("[inspect] {} types linked", registry.type_ids().count());
    Ok((registry, ctx))
}

fn cmd_layout(schema: &Path, only: Option<&str>) -> anyhow::Result<()> {
    let (registry, _) = load_registry(schema, None)?;
    let ids = match only {
        Some(name) => vec![registry.require(name)?],
        None => registry.type_ids().collect(),
    };
    for id in ids {
        let ty = registry.type_ref(id)?;
        let parent = ty
            .parent()
            .and_then(|p| registry.get(p))
            .map(|p| format!(" : {}", p.name()))
            .unwrap_or_default();
        println!(
            "{} {}{}  size={} align={}",
            if ty.is_class() { "class" } else { "struct" },
            ty.name(),
            parent,
            ty.structure_size(),
            ty.min_alignment()
        );
        let flags = ty.struct_flags().names();
        if !flags.is_empty() {
            println!("  flags: {}", flags.join("|"));
        }
        for info in describe(&registry, id)? {
            println!("  {}", info);
        }
        println!();
    }
    Ok(())
}

fn cmd_encode(
    schema: &Path,
    type_name: &str,
    values_path: &Path,
    config: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let (registry, ctx) = load_registry(schema, config)?;
    let id = registry.require(type_name)?;
    let mut instance = Instance::construct_with_defaults(&registry, id)?;
    let assignments = values::load(values_path)?;
    values::apply(&registry, &mut instance, &assignments)?;

    let bytes = write_package(&registry, &instance, &ctx)?;
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "[OK] {} ({} assignments) -> {} ({} bytes, format {})",
        type_name,
        assignments.len(),
        output.display(),
        bytes.len(),
        ctx.version.0
    );
    Ok(())
}

fn cmd_decode(schema: &Path, config: Option<&Path>, package: &Path, strict: bool) -> anyhow::Result<()> {
    let (registry, ctx) = load_registry(schema, config)?;
    let bytes = std::fs::read(package).with_context(|| format!("reading {}", package.display()))?;
    let (instance, report) = read_package(&registry, &bytes, &ctx)?;

    println!("{} ({} records, {} coerced)", instance.type_name(), report.records, report.coerced);
    for info in describe(&registry, instance.type_id())? {
        for index in 0..info.array_dim {
            let text = instance.export_property(&registry, &info.name, index)?;
            if info.array_dim > 1 {
                println!("  {}[{}] = {}", info.name, index, text);
            } else {
                println!("  {} = {}", info.name, text);
            }
        }
    }

    if !report.is_clean() {
        println!();
        for (idx, diagnostic) in report.diagnostics.iter().enumerate() {
            println!("  {}. {}", idx + 1, diagnostic);
        }
        if strict {
            bail!("{} load diagnostics", report.diagnostics.len());
        }
    }
    Ok(())
}

fn cmd_dump(package: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(package).with_context(|| format!("reading {}", package.display()))?;
    let mut reader = ArchiveReader::new(&bytes);
    let magic = reader.read_u32()?;
    if magic != PACKAGE_MAGIC {
        bail!("{} is not a package (magic 0x{:08X})", package.display(), magic);
    }
    let version = FormatVersion(reader.read_u32()?);
    let root = reader.read_string()?;
    println!("package {} format={} root={}", package.display(), version.0, root);

    let mut count = 0;
    while let Some(tag) = PropertyTag::read(&mut reader, version)? {
        let detail = match (tag.struct_name.is_empty(), tag.enum_name.is_empty(), tag.inner_type.is_empty()) {
            (false, _, _) => format!("<{}>", tag.struct_name),
            (_, false, _) => format!("<{}>", tag.enum_name),
            (_, _, false) => format!("<{}>", tag.inner_type),
            _ => String::new(),
        };
        println!(
            "  {:<24} {}{} [{}] {} bytes",
            tag.name, tag.type_name, detail, tag.array_index, tag.size
        );
        reader.skip(tag.size as usize)?;
        count += 1;
    }
    println!("{} records, {} trailing bytes", count, reader.remaining());
    Ok(())
}
