//! Wire decoding for the narrow response shapes this client owns
//!
//! The service returns flat, fixed-shape XML. Only three things are pulled
//! out of it here: the continuation token of a select page, the item list of
//! a select page, and the attribute list of a get-attributes response. The
//! extractor below scans those known tags directly; anything structurally
//! off becomes a decode error.

use sdc_core::{Error, Result};

use crate::types::{Attribute, Item};

/// One decoded page of select results
#[derive(Debug, Default)]
pub struct SelectPage {
    pub items: Vec<Item>,
    /// Continuation token; empty means no more pages
    pub next_token: String,
}

/// Decode a `SelectResponse` body into items plus the next cursor
pub fn decode_select(body: &[u8]) -> Result<SelectPage> {
    let text = as_text(body)?;
    let result = element(text, "SelectResult")
        .ok_or_else(|| Error::Decode("missing SelectResult".into()))?;

    let mut items = Vec::new();
    for raw in elements(result, "Item") {
        // The item's own <Name> precedes any <Attribute> element
        let name = element(raw, "Name")
            .ok_or_else(|| Error::Decode("item without a Name".into()))?;
        items.push(Item {
            name: unescape(name),
            attributes: attributes_of(raw)?,
        });
    }

    let next_token = element(result, "NextToken").map(unescape).unwrap_or_default();
    Ok(SelectPage { items, next_token })
}

/// Decode a `GetAttributesResponse` body into its attribute list
pub fn decode_get_attributes(body: &[u8]) -> Result<Vec<Attribute>> {
    let text = as_text(body)?;
    let result = element(text, "GetAttributesResult")
        .ok_or_else(|| Error::Decode("missing GetAttributesResult".into()))?;
    attributes_of(result)
}

fn attributes_of(scope: &str) -> Result<Vec<Attribute>> {
    let mut attrs = Vec::new();
    for raw in elements(scope, "Attribute") {
        let name = element(raw, "Name")
            .ok_or_else(|| Error::Decode("attribute without a Name".into()))?;
        let value = element(raw, "Value")
            .ok_or_else(|| Error::Decode("attribute without a Value".into()))?;
        attrs.push(Attribute::new(unescape(name), unescape(value)));
    }
    Ok(attrs)
}

fn as_text(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|_| Error::Decode("response body is not valid UTF-8".into()))
}

/// Inner text of the first `tag` element, or `None` if absent.
///
/// Tolerates attributes on the opening tag and self-closing forms.
fn element<'a>(s: &'a str, tag: &str) -> Option<&'a str> {
    find_element(s, tag).map(|(inner, _)| inner)
}

/// Inner texts of every non-overlapping `tag` element, in document order
fn elements<'a>(s: &'a str, tag: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some((inner, consumed)) = find_element(rest, tag) {
        out.push(inner);
        rest = &rest[consumed..];
    }
    out
}

/// Locate the first `tag` element; returns its inner text and the offset
/// just past its closing tag.
fn find_element<'a>(s: &'a str, tag: &str) -> Option<(&'a str, usize)> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut from = 0;
    loop {
        let start = s[from..].find(&open)? + from;
        let after_name = start + open.len();
        let content_start = match s.as_bytes().get(after_name) {
            Some(b'>') => after_name + 1,
            // self-closing <Tag/>
            Some(b'/') if s[after_name..].starts_with("/>") => {
                return Some(("", after_name + 2));
            }
            Some(c) if c.is_ascii_whitespace() => {
                let gt = s[after_name..].find('>')? + after_name;
                if s[..gt].ends_with('/') {
                    return Some(("", gt + 1));
                }
                gt + 1
            }
            // a longer tag name that merely shares the prefix
            _ => {
                from = after_name;
                continue;
            }
        };
        let end = s[content_start..].find(&close)? + content_start;
        return Some((&s[content_start..end], end + close.len()));
    }
}

/// Resolve the predefined XML entities and numeric character references
fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            out.push_str(rest);
            return out;
        };
        let entity = &rest[1..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()));
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    // unknown entity: keep it verbatim
                    None => out.push_str(&rest[..semi + 1]),
                }
            }
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECT_PAGE: &str = r#"<?xml version="1.0"?>
<SelectResponse xmlns="http://sdb.amazonaws.com/doc/2009-04-15/">
  <SelectResult>
    <Item><Name>item1</Name>
      <Attribute><Name>color</Name><Value>red</Value></Attribute>
      <Attribute><Name>size</Name><Value>large</Value></Attribute>
    </Item>
    <Item><Name>item2</Name>
      <Attribute><Name>color</Name><Value>blue</Value></Attribute>
    </Item>
    <NextToken>tok-abc</NextToken>
  </SelectResult>
  <ResponseMetadata><RequestId>r1</RequestId></ResponseMetadata>
</SelectResponse>"#;

    #[test]
    fn test_decode_select_page() {
        let page = decode_select(SELECT_PAGE.as_bytes()).unwrap();
        assert_eq!(page.next_token, "tok-abc");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "item1");
        assert_eq!(
            page.items[0].attributes,
            vec![
                Attribute::new("color", "red"),
                Attribute::new("size", "large"),
            ]
        );
        assert_eq!(page.items[1].name, "item2");
    }

    #[test]
    fn test_decode_select_without_token_means_last_page() {
        let body = "<SelectResponse><SelectResult>\
            <Item><Name>only</Name></Item>\
            </SelectResult></SelectResponse>";
        let page = decode_select(body.as_bytes()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_token.is_empty());
        assert!(page.items[0].attributes.is_empty());
    }

    #[test]
    fn test_decode_select_empty_result() {
        let body = "<SelectResponse><SelectResult/></SelectResponse>";
        let page = decode_select(body.as_bytes()).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_token.is_empty());
    }

    #[test]
    fn test_decode_select_missing_result_is_error() {
        assert!(decode_select(b"<SelectResponse></SelectResponse>").is_err());
        assert!(decode_select(b"not xml at all").is_err());
    }

    #[test]
    fn test_decode_get_attributes() {
        let body = "<GetAttributesResponse><GetAttributesResult>\
            <Attribute><Name>color</Name><Value>red</Value></Attribute>\
            <Attribute><Name>note</Name><Value>a &amp; b &lt;ok&gt;</Value></Attribute>\
            </GetAttributesResult></GetAttributesResponse>";
        let attrs = decode_get_attributes(body.as_bytes()).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].value, "a & b <ok>");
    }

    #[test]
    fn test_attribute_missing_value_is_error() {
        let body = "<GetAttributesResponse><GetAttributesResult>\
            <Attribute><Name>color</Name></Attribute>\
            </GetAttributesResult></GetAttributesResponse>";
        assert!(decode_get_attributes(body.as_bytes()).is_err());
    }

    #[test]
    fn test_unescape_numeric_references() {
        assert_eq!(unescape("caf&#233;"), "café");
        assert_eq!(unescape("caf&#xE9;"), "café");
        assert_eq!(unescape("&bogus; stays"), "&bogus; stays");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_element_ignores_longer_tag_names() {
        let s = "<NameSpace>x</NameSpace><Name>y</Name>";
        assert_eq!(element(s, "Name"), Some("y"));
    }
}
