//! End-to-end conversions: source file → canonical document.

use std::io::Write;
use std::path::{Path, PathBuf};

use bbx::bbx::{self as canon, CoreType, SubType, attrs};
use bbx::parse::SourceFormat;
use bbx::{ConversionConfig, ConversionContext, Error, Validator};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn fixture_path(name: &str) -> PathBuf {
    Path::new(FIXTURES_DIR).join(name)
}

fn strict_context() -> ConversionContext {
    ConversionContext::new(ConversionConfig {
        strict: true,
        validate: true,
        ..ConversionConfig::default()
    })
    .expect("builtin context")
}

fn of_type(dom: &bbx::dom::Dom, ty: SubType) -> Vec<bbx::dom::NodeId> {
    dom.descendants(dom.document())
        .filter(|&n| canon::is_a(dom, n, ty))
        .collect()
}

#[test]
fn test_nimas_fixture_converts_and_validates() {
    let ctx = strict_context();
    let conversion = bbx::convert_file(fixture_path("sample-nimas.xml"), &ctx).unwrap();
    let dom = &conversion.dom;

    assert_eq!(conversion.report.format, SourceFormat::Nimas);
    assert!(conversion.report.fix.total_applied() > 0);
    Validator::new(&ctx.styles).validate(dom).unwrap();

    // Metadata travels into the canonical head
    let head = canon::head(dom).unwrap();
    assert_eq!(dom.children(head).filter(|&c| dom.is_element(c)).count(), 2);

    // The nested list was hoisted out of the paragraph and flattened
    let lists = of_type(dom, SubType::LIST);
    assert_eq!(lists.len(), 1);
    assert_eq!(attrs::get::<attrs::ListLevel>(dom, lists[0]).unwrap(), Some(1));
    let nested = of_type(dom, SubType::LIST_ITEM)
        .into_iter()
        .find(|&i| dom.text_content(i).contains("nested item"))
        .unwrap();
    assert_eq!(attrs::get::<attrs::ItemLevel>(dom, nested).unwrap(), Some(1));

    // Adjacent emphasis merged into one element
    let emphasis = of_type(dom, SubType::EMPHASIS);
    let merged = emphasis
        .iter()
        .find(|&&e| dom.text_content(e) == "very emphatic")
        .copied();
    assert!(merged.is_some());

    // Table content stays inside rows and cells
    let cells = of_type(dom, "BLOCK.TABLE_CELL".parse().unwrap());
    assert_eq!(cells.len(), 4);

    // MathML is carried verbatim
    let math = of_type(dom, "INLINE.MATHML".parse().unwrap());
    assert_eq!(math.len(), 1);
    assert_eq!(dom.text_content(math[0]), "x+1");
}

#[test]
fn test_paragraph_text_survives_list_hoist() {
    let ctx = strict_context();
    let conversion = bbx::convert_file(fixture_path("sample-nimas.xml"), &ctx).unwrap();
    let dom = &conversion.dom;

    let blocks: Vec<String> = dom
        .descendants(dom.document())
        .filter(|&n| canon::is_core(dom, n, CoreType::Block))
        .map(|n| dom.text_content(n).split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    assert!(blocks.iter().any(|t| t == "Before the list"));
    assert!(blocks.iter().any(|t| t == "after the list."));
}

#[test]
fn test_strict_mode_reports_unmapped_source() {
    let ctx = strict_context();
    let source = br#"<dtbook xmlns="http://www.daisy.org/z3986/2005/dtbook/"><book><p>a <blink>b</blink></p></book></dtbook>"#;
    match bbx::convert_bytes(source, &ctx) {
        Err(Error::Parse { source, .. }) => {
            assert!(matches!(*source, Error::UnresolvedMapping { .. }));
        }
        other => panic!("expected an unresolved mapping, got {other:?}"),
    }

    let lenient = ConversionContext::new(ConversionConfig {
        validate: true,
        ..ConversionConfig::default()
    })
    .unwrap();
    let conversion = bbx::convert_bytes(source, &lenient).unwrap();
    let root = canon::root_section(&conversion.dom).unwrap();
    assert_eq!(conversion.dom.text_content(root), "a b");
}

#[test]
fn test_unknown_source_format() {
    let ctx = strict_context();
    assert!(matches!(
        bbx::convert_bytes(b"<html><body/></html>", &ctx),
        Err(Error::Config(_))
    ));
}

fn write_epub(path: &Path, chapters: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("mimetype", options).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    zip.start_file("META-INF/container.xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#,
    )
    .unwrap();

    let mut manifest = String::new();
    let mut spine = String::new();
    for (id, _) in chapters {
        manifest.push_str(&format!(
            r#"<item id="{id}" href="text/{id}.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="{id}"/>"#));
    }
    zip.start_file("OEBPS/content.opf", options).unwrap();
    zip.write_all(
        format!(
            r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>{manifest}</manifest>
  <spine>{spine}</spine>
</package>"#
        )
        .as_bytes(),
    )
    .unwrap();

    for (id, body) in chapters {
        zip.start_file(format!("OEBPS/text/{id}.xhtml"), options).unwrap();
        zip.write_all(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>{id}</title></head><body>{body}</body></html>"#
            )
            .as_bytes(),
        )
        .unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_epub_converts_one_section_per_chapter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.epub");
    write_epub(
        &path,
        &[
            ("intro", "<h1>Intro</h1><p>Hello <b>there</b>.</p>"),
            ("ch1", "<h2>One</h2><ul><li>a</li><li>b</li></ul><p>Done</p>"),
        ],
    );

    let ctx = strict_context();
    let conversion = bbx::convert_file(&path, &ctx).unwrap();
    let dom = &conversion.dom;
    assert_eq!(conversion.report.format, SourceFormat::Epub);

    let root = canon::root_section(dom).unwrap();
    let sections: Vec<_> = dom.children(root).filter(|&c| dom.is_element(c)).collect();
    assert_eq!(sections.len(), 2);
    assert_eq!(dom.attr(sections[0], None, "id"), Some("intro"));
    assert_eq!(dom.attr(sections[1], None, "id"), Some("ch1"));
    assert_eq!(of_type(dom, SubType::LIST_ITEM).len(), 2);
}

#[test]
fn test_batch_converts_in_input_order() {
    let dir = TempDir::new().unwrap();
    let mut inputs = Vec::new();
    for i in 0..5 {
        let path = dir.path().join(format!("doc{i}.xml"));
        std::fs::write(
            &path,
            format!(
                r#"<dtbook xmlns="http://www.daisy.org/z3986/2005/dtbook/"><book><p>Document {i}</p></book></dtbook>"#
            ),
        )
        .unwrap();
        inputs.push(path);
    }
    let broken = dir.path().join("broken.xml");
    std::fs::write(&broken, "<dtbook").unwrap();
    inputs.push(broken);

    let out_dir = dir.path().join("out");
    let ctx = strict_context();
    let items = bbx::convert_batch(&inputs, &out_dir, 3, &ctx).unwrap();

    assert_eq!(items.len(), inputs.len());
    for (item, input) in items.iter().zip(&inputs) {
        assert_eq!(&item.input, input);
    }
    assert_eq!(items.iter().filter(|i| i.result.is_ok()).count(), 5);
    assert!(items[5].result.is_err());

    let written = bbx::dom::parse_bytes(&std::fs::read(out_dir.join("doc3.bbx")).unwrap()).unwrap();
    let root = canon::root_section(&written).unwrap();
    assert_eq!(written.text_content(root), "Document 3");
}

/// Children of `node` as text runs, with line breaks shown as `|`.
fn runs(dom: &bbx::dom::Dom, node: bbx::dom::NodeId) -> String {
    let line_break: SubType = "INLINE.LINE_BREAK".parse().unwrap();
    dom.children(node)
        .map(|c| {
            if canon::is_a(dom, c, line_break) {
                "|".to_string()
            } else {
                dom.text_content(c)
            }
        })
        .collect()
}

#[test]
fn test_paragraphs_in_items_keep_word_boundaries() {
    let source = r#"<dtbook xmlns="http://www.daisy.org/z3986/2005/dtbook/"><book><level1>
<list type="ul"><li><p>a</p><p>b</p></li></list>
<table><tr><td>c<p>d</p></td><td><p>e</p></td></tr></table>
</level1></book></dtbook>"#;

    let ctx = strict_context();
    let conversion = bbx::convert_bytes(source.as_bytes(), &ctx).unwrap();
    let dom = &conversion.dom;

    let items = of_type(dom, SubType::LIST_ITEM);
    assert_eq!(items.len(), 1);
    assert_eq!(runs(dom, items[0]), "a|b");

    let cells = of_type(dom, "BLOCK.TABLE_CELL".parse().unwrap());
    assert_eq!(cells.len(), 2);
    assert_eq!(runs(dom, cells[0]), "c|d");
    // A lone paragraph needs no break
    assert_eq!(runs(dom, cells[1]), "e");
}

#[test]
fn test_batch_keeps_inputs_with_the_same_stem() {
    let dir = TempDir::new().unwrap();
    let mut inputs = Vec::new();
    for (sub, text) in [("a", "first"), ("b", "second")] {
        std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        let path = dir.path().join(sub).join("book.xml");
        std::fs::write(
            &path,
            format!(
                r#"<dtbook xmlns="http://www.daisy.org/z3986/2005/dtbook/"><book><p>{text}</p></book></dtbook>"#
            ),
        )
        .unwrap();
        inputs.push(path);
    }

    let out_dir = dir.path().join("out");
    let ctx = strict_context();
    let items = bbx::convert_batch(&inputs, &out_dir, 2, &ctx).unwrap();
    assert!(items.iter().all(|i| i.result.is_ok()));
    assert_ne!(items[0].output, items[1].output);

    for (item, text) in items.iter().zip(["first", "second"]) {
        let written = bbx::dom::parse_bytes(&std::fs::read(&item.output).unwrap()).unwrap();
        let root = canon::root_section(&written).unwrap();
        assert_eq!(written.text_content(root), text);
    }
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
}
