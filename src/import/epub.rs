//! EPUB source loading.
//!
//! An EPUB is a zip archive: `META-INF/container.xml` names the OPF package
//! file, whose manifest lists the content documents and whose spine orders
//! them. The spine's XHTML bodies are stitched into one XHTML tree so the
//! parser stage sees a single source document.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::dom::{parse_bytes, Dom, NodeId, QName};
use crate::error::{Error, Result};
use crate::parse::XHTML_NS;
use crate::util::strip_bom;

/// Parsed OPF content.
struct OpfData {
    /// Manifest id → (href, media type).
    manifest: HashMap<String, (String, String)>,
    spine_ids: Vec<String>,
}

/// Read an EPUB file from disk as a single XHTML source tree.
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Dom> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
///
/// The result is `<html><head/><body><section/>…</body></html>` with one
/// `<section>` per spine document, holding that document's body content.
/// The head comes from the first spine document.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<Dom> {
    let mut archive = ZipArchive::new(reader)?;

    let opf_path = find_opf_path(&mut archive)?;
    let opf_dir = Path::new(&opf_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    let opf_content = read_archive_file(&mut archive, &opf_path)?;
    let OpfData {
        manifest,
        spine_ids,
    } = parse_opf(&opf_content)?;

    let mut out = Dom::new();
    let html = out.create_element(xhtml("html"));
    out.append(out.document(), html);
    let head = out.create_element(xhtml("head"));
    out.append(html, head);
    let body = out.create_element(xhtml("body"));
    out.append(html, body);

    let mut documents = 0;
    for id in &spine_ids {
        let Some((href, media_type)) = manifest.get(id) else {
            warn!(idref = %id, "spine item missing from manifest");
            continue;
        };
        if !is_content_document(media_type) {
            continue;
        }

        let full_path = resolve_path(&opf_dir, href);
        let bytes = read_archive_file_bytes(&mut archive, &full_path)?;
        let doc = parse_bytes(&bytes)?;
        let Some(doc_root) = doc.document_element() else {
            continue;
        };

        if documents == 0
            && let Some(doc_head) = find_child(&doc, doc_root, "head")
        {
            for child in doc.children(doc_head) {
                if let Some(copy) = out.import(&doc, child) {
                    out.append(head, copy);
                }
            }
        }

        let section = out.create_element(xhtml("section"));
        out.set_attr(section, QName::new(None, "id"), id.as_str());
        out.append(body, section);
        if let Some(doc_body) = find_child(&doc, doc_root, "body") {
            for child in doc.children(doc_body) {
                if let Some(copy) = out.import(&doc, child) {
                    out.append(section, copy);
                }
            }
        }
        documents += 1;
    }

    if documents == 0 {
        return Err(Error::InvalidEpub("spine has no XHTML content documents".into()));
    }
    debug!(documents, opf = %opf_path, "read EPUB spine");
    Ok(out)
}

fn xhtml(local: &str) -> QName {
    QName::new(Some(XHTML_NS), local)
}

fn is_content_document(media_type: &str) -> bool {
    matches!(media_type, "application/xhtml+xml" | "text/html")
}

fn find_child(dom: &Dom, parent: NodeId, local: &str) -> Option<NodeId> {
    dom.children(parent)
        .find(|&c| dom.element_name(c).is_some_and(|n| n.local == local))
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let container = read_archive_file(archive, "META-INF/container.xml")?;

    let mut reader = Reader::from_str(&container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub("No rootfile found in container.xml".into()))
}

fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut manifest = HashMap::new();
    let mut spine_ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"item" => {
                    let mut id = String::new();
                    let mut href = String::new();
                    let mut media_type = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"id" => id = String::from_utf8(attr.value.to_vec())?,
                            b"href" => href = String::from_utf8(attr.value.to_vec())?,
                            b"media-type" => media_type = String::from_utf8(attr.value.to_vec())?,
                            _ => {}
                        }
                    }
                    if !id.is_empty() && !href.is_empty() {
                        manifest.insert(id, (href, media_type));
                    }
                }
                b"itemref" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"idref" {
                            spine_ids.push(String::from_utf8(attr.value.to_vec())?);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(OpfData {
        manifest,
        spine_ids,
    })
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let bytes = read_archive_file_bytes(archive, path)?;
    Ok(String::from_utf8(strip_bom(&bytes).to_vec())?)
}

fn read_archive_file_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Fallback: try percent-decoded path (handles malformed EPUBs)
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| Error::InvalidEpub(format!("Invalid UTF-8 in path: {path}")))?;

    let mut file = archive.by_name(&decoded)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{base}/{href}")
    }
}

/// Extract local name from potentially namespaced XML name
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
