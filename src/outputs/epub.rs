//! EPUB 3 serialization of an [`AssembledDocument`].
//!
//! # Container layout
//!
//! ```text
//! mimetype                  (stored, first entry)
//! META-INF/container.xml
//! EPUB/content.opf          package metadata, manifest, spine
//! EPUB/nav.xhtml            navigation document, first in the spine
//! EPUB/toc.ncx              legacy table of contents
//! EPUB/chapter_<idx>.xhtml  one per article
//! EPUB/images/...           embedded images
//! ```
//!
//! Chapter bodies come out of an HTML serializer, so void elements are
//! self-closed and `&nbsp;` is replaced by its numeric reference to keep the
//! chapter files well-formed XML.

use crate::error::Result;
use crate::models::{AssembledDocument, Chapter};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::{info, instrument};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

const CONTENT_DIR: &str = "EPUB";

/// A void start tag. Attribute values are matched as whole quoted strings so a
/// `>` inside a value does not end the tag.
static VOID_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<(area|base|br|col|embed|hr|img|input|link|meta|source|track|wbr)((?:\s+[^\s=>/"']+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/?>"#,
    )
    .unwrap()
});

/// Make serialized HTML acceptable as XHTML content.
pub fn to_xhtml(html: &str) -> String {
    VOID_ELEMENT
        .replace_all(html, "<$1$2/>")
        .replace("&nbsp;", "&#160;")
}

/// Media type for an image file name, by extension.
pub fn image_media_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn chapter_id(chapter: &Chapter) -> &str {
    chapter
        .file_name
        .strip_suffix(".xhtml")
        .unwrap_or(&chapter.file_name)
}

fn container_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{CONTENT_DIR}/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    )
}

fn package_opf(doc: &AssembledDocument) -> String {
    let mut manifest = String::from(
        r#"    <item href="nav.xhtml" id="nav" media-type="application/xhtml+xml" properties="nav"/>
    <item href="toc.ncx" id="ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    let mut spine = String::from("    <itemref idref=\"nav\"/>\n");
    let mut image_no = 0usize;

    for chapter in &doc.chapters {
        let id = chapter_id(chapter);
        manifest.push_str(&format!(
            "    <item href=\"{}\" id=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            attr(&chapter.file_name),
            attr(id)
        ));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", attr(id)));
        for path in chapter.image_files.keys() {
            manifest.push_str(&format!(
                "    <item href=\"{}\" id=\"image_{image_no}\" media-type=\"{}\"/>\n",
                attr(path),
                image_media_type(path)
            ));
            image_no += 1;
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id" xml:lang="{lang}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{lang_text}</dc:language>
    <dc:creator id="creator">{author}</dc:creator>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
        lang = attr(&doc.language),
        lang_text = text(&doc.language),
        identifier = text(&doc.identifier),
        title = text(&doc.title),
        author = text(&doc.author),
        modified = doc.created.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

fn xhtml_page(language: &str, title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        lang = attr(language),
        title = text(title),
    )
}

fn nav_xhtml(doc: &AssembledDocument) -> String {
    let items: String = doc
        .chapters
        .iter()
        .map(|c| {
            format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                attr(&c.file_name),
                text(&c.title)
            )
        })
        .collect();
    let body = format!(
        "  <nav epub:type=\"toc\" id=\"toc\" role=\"doc-toc\">\n    <h2>{}</h2>\n    <ol>\n{items}    </ol>\n  </nav>",
        text(&doc.title)
    );
    xhtml_page(&doc.language, &doc.title, &body)
}

fn toc_ncx(doc: &AssembledDocument) -> String {
    let points: String = doc
        .chapters
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "    <navPoint id=\"{id}\" playOrder=\"{order}\">\n      <navLabel><text>{label}</text></navLabel>\n      <content src=\"{src}\"/>\n    </navPoint>\n",
                id = attr(chapter_id(c)),
                order = i + 1,
                label = text(&c.title),
                src = attr(&c.file_name),
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta content="{uid}" name="dtb:uid"/>
    <meta content="1" name="dtb:depth"/>
    <meta content="0" name="dtb:totalPageCount"/>
    <meta content="0" name="dtb:maxPageNumber"/>
  </head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
        uid = attr(&doc.identifier),
        title = text(&doc.title),
    )
}

/// Write the EPUB container for `doc` into `writer`.
pub fn serialize<W: Write + Seek>(doc: &AssembledDocument, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(container_xml().as_bytes())?;

    zip.start_file(format!("{CONTENT_DIR}/content.opf"), deflated)?;
    zip.write_all(package_opf(doc).as_bytes())?;

    zip.start_file(format!("{CONTENT_DIR}/nav.xhtml"), deflated)?;
    zip.write_all(nav_xhtml(doc).as_bytes())?;

    zip.start_file(format!("{CONTENT_DIR}/toc.ncx"), deflated)?;
    zip.write_all(toc_ncx(doc).as_bytes())?;

    for chapter in &doc.chapters {
        zip.start_file(format!("{CONTENT_DIR}/{}", chapter.file_name), deflated)?;
        let page = xhtml_page(&doc.language, &chapter.title, &to_xhtml(&chapter.html_body));
        zip.write_all(page.as_bytes())?;

        for (path, bytes) in &chapter.image_files {
            zip.start_file(format!("{CONTENT_DIR}/{path}"), stored)?;
            zip.write_all(bytes)?;
        }
    }

    Ok(zip.finish()?)
}

/// Serialize `doc` and write it to `path`.
#[instrument(level = "info", skip(doc), fields(chapters = doc.chapters.len()))]
pub async fn write_epub(doc: &AssembledDocument, path: &Path) -> Result<()> {
    let bytes = serialize(doc, Cursor::new(Vec::new()))?.into_inner();
    tokio::fs::write(path, &bytes).await?;
    info!(path = %path.display(), bytes = bytes.len(), images = doc.image_count(), "Wrote EPUB");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::io::Read;
    use zip::ZipArchive;

    fn document() -> AssembledDocument {
        let mut images = BTreeMap::new();
        images.insert("images/image_1_0.png".to_string(), b"PNG".to_vec());
        AssembledDocument {
            identifier: "golem-20251029-103601".to_string(),
            title: "Golem.de - Security Articles".to_string(),
            language: "de".to_string(),
            author: "Golem.de".to_string(),
            created: Utc.with_ymd_and_hms(2025, 10, 29, 9, 36, 1).unwrap(),
            chapters: vec![
                Chapter {
                    title: "Erster & bester".to_string(),
                    file_name: "chapter_1.xhtml".to_string(),
                    html_body: "<p>Eins<br>zwei&nbsp;drei</p><img src=\"images/image_1_0.png\"/>".to_string(),
                    image_files: images,
                },
                Chapter {
                    title: "Zweiter".to_string(),
                    file_name: "chapter_3.xhtml".to_string(),
                    html_body: "<p>Drei</p><hr>".to_string(),
                    image_files: BTreeMap::new(),
                },
            ],
        }
    }

    fn read(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn open(doc: &AssembledDocument) -> ZipArchive<Cursor<Vec<u8>>> {
        let bytes = serialize(doc, Cursor::new(Vec::new())).unwrap().into_inner();
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_to_xhtml() {
        assert_eq!(
            to_xhtml(r#"<p>a<br>b&nbsp;c</p><img src="x.png" alt="y"><hr/><bright>ok</bright>"#),
            r#"<p>a<br/>b&#160;c</p><img src="x.png" alt="y"/><hr/><bright>ok</bright>"#
        );
    }

    #[test]
    fn test_to_xhtml_keeps_gt_inside_attribute_values() {
        let html = r#"<p><img src="/a.png" alt="Preis > 100 Euro"><br><img title='a>b' src="/b.png"></p>"#;
        let xhtml = to_xhtml(html);
        assert_eq!(
            xhtml,
            r#"<p><img src="/a.png" alt="Preis > 100 Euro"/><br/><img title='a>b' src="/b.png"/></p>"#
        );

        let mut reader = quick_xml::Reader::from_str(&xhtml);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("chapter markup is not well-formed: {e}"),
            }
        }
    }

    #[test]
    fn test_image_media_type() {
        assert_eq!(image_media_type("images/a.PNG"), "image/png");
        assert_eq!(image_media_type("images/a.gif"), "image/gif");
        assert_eq!(image_media_type("images/a.jpeg"), "image/jpeg");
        assert_eq!(image_media_type("images/a"), "image/jpeg");
    }

    #[test]
    fn test_mimetype_is_first_and_stored() {
        let mut archive = open(&document());
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);
        assert_eq!(read(&mut archive, "mimetype"), "application/epub+zip");
    }

    #[test]
    fn test_package_metadata_and_spine_order() {
        let mut archive = open(&document());
        let opf = read(&mut archive, "EPUB/content.opf");

        assert!(opf.contains(r#"<dc:identifier id="id">golem-20251029-103601</dc:identifier>"#));
        assert!(opf.contains("<dc:title>Golem.de - Security Articles</dc:title>"));
        assert!(opf.contains("<dc:language>de</dc:language>"));
        assert!(opf.contains(r#"<dc:creator id="creator">Golem.de</dc:creator>"#));
        assert!(opf.contains("2025-10-29T09:36:01Z"));
        assert!(opf.contains(r#"href="images/image_1_0.png" id="image_0" media-type="image/png""#));

        let nav = opf.find(r#"<itemref idref="nav"/>"#).unwrap();
        let first = opf.find(r#"<itemref idref="chapter_1"/>"#).unwrap();
        let third = opf.find(r#"<itemref idref="chapter_3"/>"#).unwrap();
        assert!(nav < first && first < third);
    }

    #[test]
    fn test_chapters_and_images_are_written() {
        let mut archive = open(&document());
        let chapter = read(&mut archive, "EPUB/chapter_1.xhtml");
        assert!(chapter.contains("<title>Erster &amp; bester</title>"));
        assert!(chapter.contains("<p>Eins<br/>zwei&#160;drei</p>"));
        assert!(archive.by_name("EPUB/chapter_3.xhtml").is_ok());

        let mut image = Vec::new();
        archive
            .by_name("EPUB/images/image_1_0.png")
            .unwrap()
            .read_to_end(&mut image)
            .unwrap();
        assert_eq!(image, b"PNG");
    }

    #[test]
    fn test_navigation_lists_chapters_in_order() {
        let mut archive = open(&document());
        let nav = read(&mut archive, "EPUB/nav.xhtml");
        let first = nav.find(r#"<a href="chapter_1.xhtml">Erster &amp; bester</a>"#).unwrap();
        let second = nav.find(r#"<a href="chapter_3.xhtml">Zweiter</a>"#).unwrap();
        assert!(first < second);

        let ncx = read(&mut archive, "EPUB/toc.ncx");
        assert!(ncx.contains(r#"<meta content="golem-20251029-103601" name="dtb:uid"/>"#));
        assert!(ncx.contains(r#"<navPoint id="chapter_3" playOrder="2">"#));
    }

    #[tokio::test]
    async fn test_write_epub_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("golem_security_20251029_103601.epub");
        write_epub(&document(), &path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 8);
    }
}
