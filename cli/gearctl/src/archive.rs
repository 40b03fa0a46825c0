//! Inspection of deployed archives.
//!
//! Web archives may carry an explicit context root in `WEB-INF/jboss-web.xml`;
//! enterprise archives map their nested web archives to context roots in
//! `META-INF/application.xml`. Descriptors are optional: when one is missing or
//! unreadable the root derived from the archive name is used instead.

use std::io::{Cursor, Read};

use roxmltree::{Document, Node, ParsingOptions};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::context::context_root;

const JBOSS_WEB_DESCRIPTOR: &str = "WEB-INF/jboss-web.xml";
const APPLICATION_DESCRIPTOR: &str = "META-INF/application.xml";

/// A deployed archive could not be opened.
#[derive(Debug, Error)]
#[error("unable to read archive {name}: {source}")]
pub struct ArchiveError {
    pub name: String,
    #[source]
    pub source: ZipError,
}

/// A web module and the context root it is served at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebModule {
    /// Name of the web archive.
    pub archive: String,
    /// Context root without leading slash; empty for the root context.
    pub context_root: String,
}

impl WebModule {
    /// Absolute path of the module.
    pub fn path(&self) -> String {
        format!("/{}", self.context_root)
    }
}

/// Result of scanning an archive for web modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Modules(Vec<WebModule>),
    /// The archive has no web modules to look for.
    Skipped { reason: String },
}

/// Scan the archive `name` for web modules.
pub fn inspect(name: &str, content: &[u8]) -> Result<ScanOutcome, ArchiveError> {
    let lower = name.to_ascii_lowercase();

    if lower.ends_with(".war") {
        let mut archive = open(name, content)?;
        let explicit = read_entry(&mut archive, name, JBOSS_WEB_DESCRIPTOR)
            .and_then(|xml| jboss_web_context_root(name, &xml));
        return Ok(ScanOutcome::Modules(vec![WebModule {
            archive: file_name(name).to_string(),
            context_root: context_root(file_name(name), explicit.as_deref()),
        }]));
    }

    if lower.ends_with(".ear") {
        let mut archive = open(name, content)?;
        return Ok(ScanOutcome::Modules(enterprise_modules(&mut archive, name)));
    }

    debug!(archive = %name, "Not a web or enterprise archive, skipping scan");
    Ok(ScanOutcome::Skipped {
        reason: format!("{name} is neither a web nor an enterprise archive"),
    })
}

fn enterprise_modules(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Vec<WebModule> {
    let application_xml = read_entry(archive, name, APPLICATION_DESCRIPTOR);
    let application = application_xml
        .as_deref()
        .and_then(|xml| parse_descriptor(name, APPLICATION_DESCRIPTOR, xml));

    let wars: Vec<String> = archive
        .file_names()
        .filter(|entry| entry.to_ascii_lowercase().ends_with(".war"))
        .map(str::to_string)
        .collect();

    let mut modules = Vec::with_capacity(wars.len());
    for war in wars {
        let uri = file_name(&war);

        let declared = application
            .as_ref()
            .and_then(|document| declared_context_root(document, uri));

        let explicit = match declared {
            Some(root) => Some(root),
            None => nested_jboss_web_root(archive, name, &war),
        };

        modules.push(WebModule {
            archive: uri.to_string(),
            context_root: context_root(uri, explicit.as_deref()),
        });
    }
    modules
}

/// Context root declared for `web_uri` by an application descriptor.
fn declared_context_root(application: &Document<'_>, web_uri: &str) -> Option<String> {
    application
        .descendants()
        .filter(|node| node.has_tag_name("web"))
        .find_map(|web| {
            let uri = child_text(web, "web-uri")?;
            if uri != web_uri {
                return None;
            }
            child_text(web, "context-root")
        })
}

/// Context root declared by a `jboss-web.xml` descriptor.
fn jboss_web_context_root(name: &str, xml: &str) -> Option<String> {
    let document = parse_descriptor(name, JBOSS_WEB_DESCRIPTOR, xml)?;
    let root = document.root_element();
    child_text(root, "context-root")
}

fn parse_descriptor<'x>(name: &str, entry: &str, xml: &'x str) -> Option<Document<'x>> {
    // JBoss descriptors commonly carry a DOCTYPE.
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;

    match Document::parse_with_options(xml, options) {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(archive = %name, entry = %entry, error = %e, "Malformed descriptor");
            None
        }
    }
}

/// Trimmed text of the first `tag` child, CDATA included. Blank text counts
/// as absent.
fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    let element = node.children().find(|child| child.has_tag_name(tag))?;
    let text: String = element
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn nested_jboss_web_root(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    war: &str,
) -> Option<String> {
    let mut content = Vec::new();
    if let Err(e) = archive
        .by_name(war)
        .map_err(|e| e.to_string())
        .and_then(|mut entry| entry.read_to_end(&mut content).map_err(|e| e.to_string()))
    {
        warn!(archive = %name, entry = %war, error = %e, "Unable to read nested web archive");
        return None;
    }

    let mut nested = match ZipArchive::new(Cursor::new(content.as_slice())) {
        Ok(nested) => nested,
        Err(e) => {
            warn!(archive = %name, entry = %war, error = %e, "Nested web archive is not a zip file");
            return None;
        }
    };

    read_entry(&mut nested, war, JBOSS_WEB_DESCRIPTOR)
        .and_then(|xml| jboss_web_context_root(war, &xml))
}

fn open<'a>(name: &str, content: &'a [u8]) -> Result<ZipArchive<Cursor<&'a [u8]>>, ArchiveError> {
    ZipArchive::new(Cursor::new(content)).map_err(|source| ArchiveError {
        name: name.to_string(),
        source,
    })
}

/// Read a text entry. Missing entries are expected; read failures are logged.
fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    entry: &str,
) -> Option<String> {
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            debug!(archive = %name, entry = %entry, "Descriptor not present");
            return None;
        }
        Err(e) => {
            warn!(archive = %name, entry = %entry, error = %e, "Unable to open descriptor");
            return None;
        }
    };

    let mut text = String::new();
    match file.read_to_string(&mut text) {
        Ok(_) => Some(text),
        Err(e) => {
            warn!(archive = %name, entry = %entry, error = %e, "Unable to read descriptor");
            None
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jboss_web_context_root() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <!DOCTYPE jboss-web PUBLIC "-//JBoss//DTD Web Application 5.0//EN"
                "http://www.jboss.org/j2ee/dtd/jboss-web_5_0.dtd">
            <jboss-web>
              <context-root> /shop </context-root>
            </jboss-web>"#;
        assert_eq!(jboss_web_context_root("shop.war", xml).as_deref(), Some("/shop"));
    }

    #[test]
    fn test_commented_out_context_root_is_ignored() {
        let xml = "<jboss-web><!-- <context-root>/old</context-root> --><context-root>/shop</context-root></jboss-web>";
        assert_eq!(jboss_web_context_root("shop.war", xml).as_deref(), Some("/shop"));

        let only_comment = "<jboss-web><!-- <context-root>/old</context-root> --></jboss-web>";
        assert_eq!(jboss_web_context_root("shop.war", only_comment), None);
    }

    #[test]
    fn test_cdata_context_root_is_unwrapped() {
        let xml = "<jboss-web><context-root><![CDATA[shop]]></context-root></jboss-web>";
        assert_eq!(jboss_web_context_root("shop.war", xml).as_deref(), Some("shop"));
    }

    #[test]
    fn test_namespaced_and_malformed_descriptors() {
        let namespaced = r#"<jboss-web xmlns="http://www.jboss.com/xml/ns/javaee"><context-root>/ns</context-root></jboss-web>"#;
        assert_eq!(jboss_web_context_root("ns.war", namespaced).as_deref(), Some("/ns"));

        assert_eq!(jboss_web_context_root("bad.war", "<jboss-web><context-root>"), None);
        assert_eq!(jboss_web_context_root("empty.war", "<jboss-web><context-root/></jboss-web>"), None);
    }

    #[test]
    fn test_declared_context_root() {
        let xml = r#"
            <application>
              <module><ejb>beans.jar</ejb></module>
              <module>
                <web>
                  <web-uri>first.war</web-uri>
                  <context-root>/one</context-root>
                </web>
              </module>
              <module>
                <web>
                  <web-uri>second.war</web-uri>
                  <context-root>two</context-root>
                </web>
              </module>
            </application>"#;
        let document = Document::parse(xml).unwrap();

        assert_eq!(declared_context_root(&document, "first.war").as_deref(), Some("/one"));
        assert_eq!(declared_context_root(&document, "second.war").as_deref(), Some("two"));
        assert_eq!(declared_context_root(&document, "third.war"), None);
    }

    #[test]
    fn test_non_web_archive_is_skipped() {
        let outcome = inspect("library.jar", b"not inspected").unwrap();
        assert!(matches!(outcome, ScanOutcome::Skipped { .. }));
    }

    #[test]
    fn test_corrupt_web_archive_is_an_error() {
        let err = inspect("broken.war", b"definitely not a zip").unwrap_err();
        assert_eq!(err.name, "broken.war");
    }

    #[test]
    fn test_module_path() {
        let module = WebModule {
            archive: "ROOT.war".into(),
            context_root: String::new(),
        };
        assert_eq!(module.path(), "/");
    }
}
