//! Rendering of per-year XML documents.
//!
//! Free text (titles, authors, HTML bodies, labels) is written as CDATA so raw
//! markup survives untouched. Timestamps and permalinks are written as escaped
//! text nodes. Missing optional fields are omitted rather than written empty.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <posts year="2020">
//!   <post>
//!     <title><![CDATA[Hello]]></title>
//!     <published>2020-01-01T10:00:00.000Z</published>
//!     <updated>2020-01-02T10:00:00.000Z</updated>
//!     <author><![CDATA[Ada]]></author>
//!     <content><![CDATA[<p>Hi</p>]]></content>
//!     <category><![CDATA[news]]></category>
//!     <link>https://myblog.blogspot.com/2020/01/hello.html</link>
//!   </post>
//! </posts>
//! ```

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Result};
use crate::types::{BlogId, PostEntry};

/// File name of the document for one year (`<blogId>_<year>.xml`)
pub fn file_name(blog_id: &BlogId, year: i32) -> String {
    format!("{}_{}.xml", blog_id, year)
}

/// Render the posts of one year as an XML document
///
/// Output depends only on the input, so identical entries always produce
/// byte-identical documents.
///
/// # Errors
/// Returns [`Error::Document`] if the writer fails or produces invalid UTF-8
pub fn render_year(year: i32, entries: &[PostEntry]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let year_attr = year.to_string();
    let mut root = BytesStart::new("posts");
    root.push_attribute(("year", year_attr.as_str()));
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    for entry in entries {
        write_post(&mut writer, entry)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("posts")))
        .map_err(xml_error)?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Document(format!("document is not valid UTF-8: {}", e)))?;
    xml.push('\n');
    Ok(xml)
}

fn write_post(writer: &mut Writer<Vec<u8>>, entry: &PostEntry) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("post")))
        .map_err(xml_error)?;

    write_cdata_element(writer, "title", &entry.title)?;
    write_text_element(writer, "published", &entry.published)?;
    write_text_element(writer, "updated", &entry.updated)?;
    if let Some(author) = &entry.author {
        write_cdata_element(writer, "author", author)?;
    }
    if let Some(content) = &entry.content {
        write_cdata_element(writer, "content", content)?;
    }
    for category in &entry.categories {
        write_cdata_element(writer, "category", category)?;
    }
    if let Some(link) = &entry.permalink {
        write_text_element(writer, "link", link)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("post")))
        .map_err(xml_error)?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_error)?;
    Ok(())
}

fn write_cdata_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(xml_error)?;
    for part in cdata_sections(text) {
        writer
            .write_event(Event::CData(BytesCData::new(part)))
            .map_err(xml_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(xml_error)?;
    Ok(())
}

/// Split text so no section contains the CDATA terminator `]]>`
///
/// Each split happens between `]]` and `>`, so concatenating the sections
/// gives back the original text.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Document(e.to_string())
}
