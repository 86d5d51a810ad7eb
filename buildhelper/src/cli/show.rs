use std::{io::Write, path::Path};

use crate::{
    ci::CiProvider,
    docker::{BuildArgs, Cache},
    resolver::Resolver,
    Result,
};

pub fn image(resolver: &Resolver, all: bool, out: &mut dyn Write) -> Result<()> {
    if all {
        for reference in resolver.image_references() {
            writeln!(out, "{reference}")?;
        }
    } else {
        writeln!(out, "{}", resolver.image())?;
    }
    Ok(())
}

pub fn cache_tags(resolver: &Resolver, export: bool, out: &mut dyn Write) -> Result<()> {
    if export {
        if let Some(reference) = resolver.cache_to() {
            writeln!(out, "{reference}")?;
        }
    } else {
        for reference in resolver.cache_from() {
            writeln!(out, "{reference}")?;
        }
    }
    Ok(())
}

pub fn build_args(resolver: &Resolver, context: &Path, out: &mut dyn Write) -> Result<()> {
    let images = resolver.image_references();
    let cache = Cache::from_resolver(resolver);
    let args = BuildArgs {
        images: &images,
        cache: &cache,
        push: BuildArgs::push_from_env(resolver.env()),
        context,
    };
    writeln!(out, "{}", args.to_args().join(" "))?;
    Ok(())
}

pub fn ci(ci: &dyn CiProvider, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &ci.metadata())?;
    writeln!(out)?;
    Ok(())
}

pub fn info(resolver: &Resolver, out: &mut dyn Write) -> Result<()> {
    use comfy_table::{Attribute, Cell, ContentArrangement, Table};

    let join = |references: Vec<String>| references.join("\n");

    let rows = [
        ("ci", resolver.ci().name().to_owned()),
        ("build id", resolver.ci().incremental_id().to_owned()),
        ("git ref", resolver.git_ref()),
        ("git sha", resolver.git_sha()),
        ("branch", resolver.branch()),
        ("latest branch", resolver.latest_branch().to_owned()),
        ("tag", resolver.tag().into()),
        ("repository", resolver.repository()),
        ("registry", resolver.registry_host()),
        (
            "images",
            join(
                resolver
                    .image_references()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            ),
        ),
        ("cache repository", resolver.cache_repository()),
        ("cache registry", resolver.cache_registry_host()),
        (
            "cache from",
            join(resolver.cache_from().iter().map(ToString::to_string).collect()),
        ),
        (
            "cache to",
            resolver
                .cache_to()
                .map(|reference| reference.to_string())
                .unwrap_or_default(),
        ),
    ];

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["name", "value"]
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
        );
    for (name, value) in rows {
        table.add_row([name.to_owned(), value]);
    }

    writeln!(out, "{table}")?;
    Ok(())
}
