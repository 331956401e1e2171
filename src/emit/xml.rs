//! `.project` and `.classpath` rendering.

use std::io::Cursor;

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{ProjectDescriptor, DEFAULT_OUTPUT};
use crate::reconcile::PLACEHOLDER_ROOT;

const JAVA_BUILDER: &str = "org.eclipse.jdt.core.javabuilder";
const MANIFEST_BUILDER: &str = "org.eclipse.pde.ManifestBuilder";
const SCHEMA_BUILDER: &str = "org.eclipse.pde.SchemaBuilder";
const JAVA_NATURE: &str = "org.eclipse.jdt.core.javanature";
const PLUGIN_NATURE: &str = "org.eclipse.pde.PluginNature";
const JRE_CONTAINER: &str = "org.eclipse.jdt.launching.JRE_CONTAINER";
const PLUGIN_CONTAINER: &str = "org.eclipse.pde.core.requiredPlugins";

/// Folder link type in `.project`.
const FOLDER_LINK: &str = "2";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn new_writer() -> Result<XmlWriter> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b'\t', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

fn finish(writer: XmlWriter) -> Result<String> {
    let bytes = writer.into_inner().into_inner();
    let mut xml = String::from_utf8(bytes).context("descriptor is not UTF-8")?;
    if !xml.ends_with('\n') {
        xml.push('\n');
    }
    Ok(xml)
}

fn write_simple(writer: &mut XmlWriter, tag: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Render the `.project` descriptor.
pub fn render_project(descriptor: &ProjectDescriptor) -> Result<String> {
    let mut writer = new_writer()?;
    writer.write_event(Event::Start(BytesStart::new("projectDescription")))?;

    write_simple(&mut writer, "name", &descriptor.name)?;
    writer.write_event(Event::Empty(BytesStart::new("comment")))?;
    writer.write_event(Event::Empty(BytesStart::new("projects")))?;

    writer.write_event(Event::Start(BytesStart::new("buildSpec")))?;
    for builder in [JAVA_BUILDER, MANIFEST_BUILDER, SCHEMA_BUILDER] {
        writer.write_event(Event::Start(BytesStart::new("buildCommand")))?;
        write_simple(&mut writer, "name", builder)?;
        writer.write_event(Event::Empty(BytesStart::new("arguments")))?;
        writer.write_event(Event::End(BytesEnd::new("buildCommand")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("buildSpec")))?;

    writer.write_event(Event::Start(BytesStart::new("natures")))?;
    for nature in [JAVA_NATURE, PLUGIN_NATURE] {
        write_simple(&mut writer, "nature", nature)?;
    }
    writer.write_event(Event::End(BytesEnd::new("natures")))?;

    if !descriptor.links.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("linkedResources")))?;
        for link in &descriptor.links {
            writer.write_event(Event::Start(BytesStart::new("link")))?;
            write_simple(&mut writer, "name", &link.name)?;
            write_simple(&mut writer, "type", FOLDER_LINK)?;
            write_simple(&mut writer, "locationURI", &link.location)?;
            writer.write_event(Event::End(BytesEnd::new("link")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("linkedResources")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("projectDescription")))?;
    finish(writer)
}

/// Render the `.classpath` descriptor.
pub fn render_classpath(descriptor: &ProjectDescriptor) -> Result<String> {
    let mut writer = new_writer()?;
    writer.write_event(Event::Start(BytesStart::new("classpath")))?;

    for source in &descriptor.sources {
        let mut entry = BytesStart::new("classpathentry");
        entry.push_attribute(("kind", "src"));
        entry.push_attribute(("path", source.path.as_str()));
        entry.push_attribute(("output", source.output.as_str()));
        if !source.including.is_empty() {
            entry.push_attribute(("including", source.including.join("|").as_str()));
        }
        if !source.excluding.is_empty() {
            entry.push_attribute(("excluding", source.excluding.join("|").as_str()));
        }
        writer.write_event(Event::Empty(entry))?;
    }

    if !descriptor.missing.is_empty() {
        writer.write_event(Event::Comment(BytesText::from_escaped(placeholder_comment(
            &descriptor.missing,
        ))))?;
    }

    for container in [JRE_CONTAINER, PLUGIN_CONTAINER] {
        let mut entry = BytesStart::new("classpathentry");
        entry.push_attribute(("kind", "con"));
        entry.push_attribute(("path", container));
        writer.write_event(Event::Empty(entry))?;
    }

    for dependency in &descriptor.dependencies {
        let path = format!("/{}", dependency.project);
        let mut entry = BytesStart::new("classpathentry");
        entry.push_attribute(("kind", "src"));
        entry.push_attribute(("path", path.as_str()));
        entry.push_attribute(("combineaccessrules", "false"));
        if dependency.exported {
            entry.push_attribute(("exported", "true"));
        }
        writer.write_event(Event::Empty(entry))?;
    }

    let mut output = BytesStart::new("classpathentry");
    output.push_attribute(("kind", "output"));
    output.push_attribute(("path", DEFAULT_OUTPUT));
    writer.write_event(Event::Empty(output))?;

    writer.write_event(Event::End(BytesEnd::new("classpath")))?;
    finish(writer)
}

/// A commented-out entry listing the files without source.
///
/// Comment text may not contain `--`, so dash runs are split apart.
fn placeholder_comment(missing: &[String]) -> String {
    let joined = missing.join("|");
    let mut including = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '-' && including.ends_with('-') {
            including.push(' ');
        }
        including.push(c);
    }
    format!(
        " <classpathentry kind=\"src\" path=\"{}\" including=\"{}\"/> ",
        PLACEHOLDER_ROOT,
        escape_attribute(&including)
    )
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
