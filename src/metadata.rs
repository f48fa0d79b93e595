//! Primary metadata decoding.
//!
//! A repository's `*-primary.xml.gz` lists every package with its download
//! location and, inside `<format>`, the byte range of the RPM header within
//! the package file:
//!
//! ```xml
//! <metadata xmlns="http://linux.duke.edu/metadata/common"
//!           xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="1">
//!   <package type="rpm">
//!     <name>vim</name>
//!     <arch>x86_64</arch>
//!     <version epoch="0" ver="8.0.1568" rel="lp150.1.2"/>
//!     <location href="x86_64/vim-8.0.1568-lp150.1.2.x86_64.rpm"/>
//!     <format>
//!       <rpm:header-range start="1384" end="48210"/>
//!     </format>
//!   </package>
//! </metadata>
//! ```
//!
//! The namespace of the common elements is taken from the root element,
//! so documents with a different default namespace still decode.

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::filter::PackageFilter;
use crate::models::{HeaderRange, PackageRecord};

/// Namespace of the `rpm:` elements in primary metadata.
pub const RPM_NAMESPACE: &[u8] = b"http://linux.duke.edu/metadata/rpm";

/// Open a gzip-compressed metadata document for reading.
pub fn open_metadata(path: &Path) -> Result<impl BufRead> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open metadata file: {}", path.display()))?;
    Ok(BufReader::new(MultiGzDecoder::new(BufReader::new(file))))
}

/// Element name resolved against the namespaces in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QName {
    ns: Option<Vec<u8>>,
    local: Vec<u8>,
}

impl QName {
    fn resolve(res: ResolveResult, e: &BytesStart) -> Self {
        let ns = match res {
            ResolveResult::Bound(Namespace(ns)) => Some(ns.to_vec()),
            _ => None,
        };
        Self {
            ns,
            local: e.local_name().as_ref().to_vec(),
        }
    }

    fn is(&self, ns: Option<&[u8]>, local: &[u8]) -> bool {
        self.ns.as_deref() == ns && self.local == local
    }
}

/// Package being assembled while its element is open.
#[derive(Default)]
struct Pending {
    name: Option<String>,
    arch: Option<String>,
    version: Option<String>,
    location: Option<String>,
    header_ranges: Vec<HeaderRange>,
    /// Set once the name is known and the filter rejected it.
    skipped: bool,
}

impl Pending {
    fn finish(self) -> Result<Option<PackageRecord>> {
        if self.skipped {
            return Ok(None);
        }
        let Some(name) = self.name else {
            bail!("<package> element without <name>");
        };
        let Some(location) = self.location else {
            bail!("package '{}' has no location href", name);
        };
        Ok(Some(PackageRecord {
            name,
            arch: self.arch,
            version: self.version,
            location,
            header_ranges: self.header_ranges,
        }))
    }
}

/// Decode the packages of a primary metadata document that pass `filter`.
///
/// Packages rejected by the filter are dropped as soon as their name has
/// been read; nothing else about them is decoded.
pub fn parse_packages<R: BufRead>(input: R, filter: &PackageFilter) -> Result<Vec<PackageRecord>> {
    let mut reader = NsReader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<QName> = Vec::new();
    let mut doc_ns: Option<Option<Vec<u8>>> = None;
    let mut pending: Option<Pending> = None;
    let mut text = String::new();
    let mut packages = Vec::new();
    let mut seen = 0usize;

    loop {
        let (res, event) = reader
            .read_resolved_event_into(&mut buf)
            .with_context(|| "Malformed metadata document")?;

        match event {
            Event::Start(e) => {
                let qname = QName::resolve(res, &e);
                let root_ns = doc_ns.get_or_insert_with(|| qname.ns.clone()).clone();
                let parent = stack.last();
                let in_package = stack.len() == 2 && pending.is_some();

                if stack.len() == 1 && qname.is(root_ns.as_deref(), b"package") {
                    pending = Some(Pending::default());
                    seen += 1;
                } else if in_package {
                    text.clear();
                    if let Some(p) = pending.as_mut().filter(|p| !p.skipped) {
                        visit(p, &qname, &e, root_ns.as_deref())?;
                    }
                } else if let (Some(parent), Some(p)) = (parent, pending.as_mut()) {
                    if !p.skipped && is_header_range(parent, &qname, root_ns.as_deref()) {
                        p.header_ranges.push(header_range(&e)?);
                    }
                }
                stack.push(qname);
            }
            Event::Empty(e) => {
                let qname = QName::resolve(res, &e);
                let root_ns = doc_ns.get_or_insert_with(|| qname.ns.clone()).clone();
                if let (Some(parent), Some(p)) = (stack.last(), pending.as_mut()) {
                    if !p.skipped {
                        if stack.len() == 2 {
                            visit(p, &qname, &e, root_ns.as_deref())?;
                        } else if is_header_range(parent, &qname, root_ns.as_deref()) {
                            p.header_ranges.push(header_range(&e)?);
                        }
                    }
                }
            }
            Event::Text(t) => {
                if stack.len() == 3 && pending.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if stack.len() == 3 && pending.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(qname) = stack.pop() else {
                    bail!("Unbalanced end tag in metadata document");
                };
                let root_ns = doc_ns.clone().flatten();

                if stack.len() == 2 {
                    if let Some(p) = pending.as_mut().filter(|p| !p.skipped) {
                        if qname.is(root_ns.as_deref(), b"name") {
                            let name = std::mem::take(&mut text);
                            p.skipped = !filter.matches(&name);
                            p.name = Some(name);
                        } else if qname.is(root_ns.as_deref(), b"arch") {
                            p.arch = Some(std::mem::take(&mut text));
                        }
                    }
                } else if stack.len() == 1 && qname.is(root_ns.as_deref(), b"package") {
                    if let Some(record) = pending.take().map(Pending::finish).transpose()?.flatten() {
                        packages.push(record);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if doc_ns.is_none() {
        bail!("Metadata document has no root element");
    }
    if !stack.is_empty() {
        bail!("Metadata document ended with {} unclosed element(s)", stack.len());
    }

    debug!(total = seen, selected = packages.len(), "decoded primary metadata");
    Ok(packages)
}

/// Record what a direct child of `<package>` tells us.
fn visit(p: &mut Pending, qname: &QName, e: &BytesStart, doc_ns: Option<&[u8]>) -> Result<()> {
    if qname.is(doc_ns, b"location") {
        if let Some(href) = e.try_get_attribute("href")? {
            p.location = Some(href.unescape_value()?.into_owned());
        }
    } else if qname.is(doc_ns, b"version") {
        p.version = Some(format_version(e)?);
    }
    Ok(())
}

fn is_header_range(parent: &QName, qname: &QName, doc_ns: Option<&[u8]>) -> bool {
    parent.is(doc_ns, b"format") && qname.is(Some(RPM_NAMESPACE), b"header-range")
}

fn header_range(e: &BytesStart) -> Result<HeaderRange> {
    let offset = |key: &str| -> Result<u64> {
        let attr = e
            .try_get_attribute(key)?
            .with_context(|| format!("header-range without '{}' attribute", key))?;
        let value = attr.unescape_value()?;
        value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid header-range {}: '{}'", key, value))
    };
    let range = HeaderRange {
        start: offset("start")?,
        end: offset("end")?,
    };
    if range.end < range.start {
        bail!(
            "header-range end {} lies before start {}",
            range.end,
            range.start
        );
    }
    Ok(range)
}

/// `epoch:ver-rel`, with the epoch omitted when it is zero or absent.
fn format_version(e: &BytesStart) -> Result<String> {
    let attr = |key: &str| -> Result<Option<String>> {
        Ok(match e.try_get_attribute(key)? {
            Some(a) => Some(a.unescape_value()?.into_owned()),
            None => None,
        })
    };
    let mut out = String::new();
    if let Some(epoch) = attr("epoch")?.filter(|s| !s.is_empty() && s != "0") {
        out.push_str(&epoch);
        out.push(':');
    }
    out.push_str(&attr("ver")?.unwrap_or_default());
    if let Some(rel) = attr("rel")?.filter(|s| !s.is_empty()) {
        out.push('-');
        out.push_str(&rel);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="3">
<package type="rpm">
  <name>vim</name>
  <arch>x86_64</arch>
  <version epoch="0" ver="8.0.1568" rel="lp150.1.2"/>
  <checksum type="sha256" pkgid="YES">abc</checksum>
  <summary>Vi IMproved</summary>
  <location href="x86_64/vim-8.0.1568-lp150.1.2.x86_64.rpm"/>
  <format>
    <rpm:license>Vim</rpm:license>
    <rpm:header-range start="1384" end="48210"/>
  </format>
</package>
<package type="rpm">
  <name>vim-data</name>
  <arch>noarch</arch>
  <version epoch="1" ver="8.0.1568" rel="lp150.1.2"/>
  <location href="noarch/vim-data-8.0.1568-lp150.1.2.noarch.rpm"/>
  <format>
    <rpm:header-range start="0" end="999"/>
  </format>
</package>
<package type="rpm">
  <name>gvim</name>
  <location href="x86_64/gvim.rpm"/>
  <format>
    <rpm:header-range start="10" end="20"/>
  </format>
</package>
</metadata>
"#;

    fn parse(xml: &str, filter: &PackageFilter) -> Result<Vec<PackageRecord>> {
        parse_packages(xml.as_bytes(), filter)
    }

    #[test]
    fn test_exact_filter() {
        let filter = PackageFilter::new(false, false, Some("vim")).unwrap();
        let pkgs = parse(PRIMARY, &filter).unwrap();
        assert_eq!(pkgs.len(), 1);
        let vim = &pkgs[0];
        assert_eq!(vim.name, "vim");
        assert_eq!(vim.arch.as_deref(), Some("x86_64"));
        assert_eq!(vim.version.as_deref(), Some("8.0.1568-lp150.1.2"));
        assert_eq!(vim.location, "x86_64/vim-8.0.1568-lp150.1.2.x86_64.rpm");
        assert_eq!(
            vim.header_ranges,
            vec![HeaderRange {
                start: 1384,
                end: 48210
            }]
        );
    }

    #[test]
    fn test_pattern_filter() {
        let filter = PackageFilter::new(false, true, Some("vim")).unwrap();
        let names: Vec<_> = parse(PRIMARY, &filter)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["vim", "vim-data"]);
    }

    #[test]
    fn test_all_filter_and_epoch() {
        let pkgs = parse(PRIMARY, &PackageFilter::All).unwrap();
        assert_eq!(pkgs.len(), 3);
        assert_eq!(pkgs[1].version.as_deref(), Some("1:8.0.1568-lp150.1.2"));
        assert_eq!(pkgs[2].arch, None);
    }

    #[test]
    fn test_nothing_filter() {
        assert!(parse(PRIMARY, &PackageFilter::Nothing).unwrap().is_empty());
    }

    #[test]
    fn test_namespace_taken_from_root() {
        let xml = r#"<md xmlns="urn:example:primary" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
<package><name>foo</name><location href="foo.rpm"/>
<format><rpm:header-range start="5" end="50"/></format></package>
</md>"#;
        let pkgs = parse(xml, &PackageFilter::All).unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].header_ranges[0].end, 50);
    }

    #[test]
    fn test_foreign_namespace_elements_ignored() {
        let xml = r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:o="urn:other">
<o:package><name>ghost</name></o:package>
<package><name>foo</name><location href="foo.rpm"/><format/></package>
</metadata>"#;
        let pkgs = parse(xml, &PackageFilter::All).unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "foo");
        assert!(pkgs[0].header_ranges.is_empty());
    }

    #[test]
    fn test_every_header_range_is_kept() {
        let xml = r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
<package><name>foo</name><location href="foo.rpm"/>
<format><rpm:header-range start="0" end="10"/><rpm:header-range start="20" end="30"/></format></package>
</metadata>"#;
        let pkgs = parse(xml, &PackageFilter::All).unwrap();
        assert_eq!(pkgs[0].header_ranges.len(), 2);
        assert_eq!(pkgs[0].header_ranges[1], HeaderRange { start: 20, end: 30 });
    }

    #[test]
    fn test_header_range_outside_format_ignored() {
        let xml = r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
<package><name>foo</name><location href="foo.rpm"/><rpm:header-range start="0" end="10"/><format/></package>
</metadata>"#;
        let pkgs = parse(xml, &PackageFilter::All).unwrap();
        assert!(pkgs[0].header_ranges.is_empty());
    }

    #[test]
    fn test_rejected_package_is_not_validated() {
        // The skipped package has a broken header range; it must not matter.
        let xml = r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
<package><name>bad</name><format><rpm:header-range start="x" end="y"/></format></package>
<package><name>good</name><location href="good.rpm"/><format><rpm:header-range start="0" end="1"/></format></package>
</metadata>"#;
        let filter = PackageFilter::new(false, false, Some("good")).unwrap();
        let pkgs = parse(xml, &filter).unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "good");
    }

    #[test]
    fn test_invalid_header_range_is_fatal() {
        let xml = r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
<package><name>foo</name><location href="foo.rpm"/><format><rpm:header-range start="0" end="lots"/></format></package>
</metadata>"#;
        let err = parse(xml, &PackageFilter::All).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid header-range end"));
    }

    #[test]
    fn test_missing_location_is_fatal() {
        let xml = r#"<metadata xmlns="http://linux.duke.edu/metadata/common"><package><name>foo</name></package></metadata>"#;
        let err = parse(xml, &PackageFilter::All).unwrap_err();
        assert!(err.to_string().contains("no location"));
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(parse("<metadata><package><name>foo</nam></package></metadata>", &PackageFilter::All).is_err());
        assert!(parse("<metadata><package>", &PackageFilter::All).is_err());
        assert!(parse("", &PackageFilter::All).is_err());
    }

    #[test]
    fn test_open_metadata_decompresses() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc-primary.xml.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(PRIMARY.as_bytes()).unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();

        let reader = open_metadata(&path).unwrap();
        let pkgs = parse_packages(reader, &PackageFilter::All).unwrap();
        assert_eq!(pkgs.len(), 3);
    }

    #[test]
    fn test_open_metadata_rejects_plain_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc-primary.xml.gz");
        std::fs::write(&path, PRIMARY).unwrap();

        let reader = open_metadata(&path).unwrap();
        assert!(parse_packages(reader, &PackageFilter::All).is_err());
    }
}
