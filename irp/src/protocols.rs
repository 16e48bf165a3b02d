//! Reading protocol definitions from an IrpProtocols.xml database, so that
//! protocols can be referred to by name.

use super::{Error, Protocol, Result};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    str::FromStr,
};
use xml::reader::{EventReader, XmlEvent};

/// Entry in an IrpProtocols.xml database
#[derive(Debug, PartialEq, Clone)]
pub struct ProtocolEntry {
    pub name: String,
    pub alt_names: Vec<String>,
    pub irp: String,
    pub decodable: bool,
    pub absolute_tolerance: u32,
    pub relative_tolerance: f64,
    pub minimum_leadout: u32,
}

impl Default for ProtocolEntry {
    fn default() -> Self {
        ProtocolEntry {
            name: String::new(),
            alt_names: Vec::new(),
            irp: String::new(),
            decodable: true,
            absolute_tolerance: 100,
            relative_tolerance: 0.3,
            minimum_leadout: 20000,
        }
    }
}

impl ProtocolEntry {
    /// Does this entry go by `name`, ignoring case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.alt_names.iter().any(|alt| alt.eq_ignore_ascii_case(name))
    }

    pub fn protocol(&self) -> Result<Protocol> {
        Protocol::parse(&self.irp)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProtocolDatabase {
    pub entries: Vec<ProtocolEntry>,
}

enum Element {
    None,
    Irp,
    AbsoluteTolerance,
    RelativeTolerance,
    AlternateName,
    Decodable,
    MinimumLeadout,
}

fn value<T: FromStr>(protocol: &str, field: &str, data: &str) -> Result<T> {
    data.trim().parse().map_err(|_| {
        Error::incompatible(format!(
            "protocol {protocol}: invalid value ‘{data}’ for {field}"
        ))
    })
}

impl ProtocolDatabase {
    pub fn parse(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::incompatible(format!("{}: {e}", path.display())))?;

        Self::parse_reader(BufReader::new(file))
    }

    pub fn parse_reader<R: Read>(reader: R) -> Result<Self> {
        let parser = EventReader::new(reader);
        let mut entries = Vec::new();
        let mut entry: Option<ProtocolEntry> = None;
        let mut element = Element::None;

        for e in parser {
            match e.map_err(|e| Error::incompatible(format!("xml: {e}")))? {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => match name.local_name.as_ref() {
                    "protocol" => {
                        let name = attributes
                            .iter()
                            .find(|attr| attr.name.local_name == "name")
                            .ok_or_else(|| {
                                Error::incompatible("protocol element without name attribute")
                            })?;

                        entry = Some(ProtocolEntry {
                            name: name.value.to_owned(),
                            ..Default::default()
                        });
                    }
                    "irp" => {
                        element = Element::Irp;
                    }
                    "parameter" => {
                        for attr in attributes {
                            element = match attr.value.as_ref() {
                                "absolute-tolerance" => Element::AbsoluteTolerance,
                                "relative-tolerance" => Element::RelativeTolerance,
                                "decodable" => Element::Decodable,
                                "alt_name" => Element::AlternateName,
                                "minimum-leadout" => Element::MinimumLeadout,
                                _ => Element::None,
                            };
                        }
                    }
                    _ => (),
                },
                XmlEvent::Characters(data) | XmlEvent::CData(data) => {
                    if let Some(entry) = &mut entry {
                        match element {
                            Element::Irp => {
                                entry.irp.push_str(data.trim());
                            }
                            Element::AlternateName => {
                                entry.alt_names.push(data.trim().to_owned());
                            }
                            Element::Decodable => {
                                entry.decodable = value(&entry.name, "decodable", &data)?;
                            }
                            Element::AbsoluteTolerance => {
                                entry.absolute_tolerance =
                                    value(&entry.name, "absolute-tolerance", &data)?;
                            }
                            Element::RelativeTolerance => {
                                entry.relative_tolerance =
                                    value(&entry.name, "relative-tolerance", &data)?;
                            }
                            Element::MinimumLeadout => {
                                entry.minimum_leadout =
                                    value(&entry.name, "minimum-leadout", &data)?;
                            }
                            Element::None => (),
                        }
                    }

                    if !matches!(element, Element::Irp) {
                        element = Element::None;
                    }
                }
                XmlEvent::EndElement { name } => match name.local_name.as_ref() {
                    "protocol" => {
                        if let Some(entry) = entry.take() {
                            entries.push(entry);
                        }
                    }
                    "irp" => {
                        element = Element::None;
                    }
                    _ => (),
                },
                _ => (),
            }
        }

        Ok(ProtocolDatabase { entries })
    }

    /// Find a protocol by name or alternative name, ignoring case
    pub fn find(&self, name: &str) -> Option<&ProtocolEntry> {
        self.entries.iter().find(|entry| entry.is_named(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATABASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<irp:protocols xmlns:irp="http://www.harctoolbox.org/irp-protocols" version="2020-01-01">
    <irp:protocol name="NEC1">
        <irp:parameter name="alt_name">NEC</irp:parameter>
        <irp:parameter name="relative-tolerance">0.2</irp:parameter>
        <irp:irp><![CDATA[{38.4k,564}<1,-1|1,-3>(16,-8,D:8,S:8,F:8,~F:8,1,^108m,(16,-4,1,^108m)*) [D:0..255,S:0..255=255-D,F:0..255]]]></irp:irp>
        <irp:documentation>The most common protocol.</irp:documentation>
    </irp:protocol>
    <irp:protocol name="RC5">
        <irp:parameter name="decodable">false</irp:parameter>
        <irp:parameter name="absolute-tolerance">50</irp:parameter>
        <irp:irp><![CDATA[{36k,msb,889}<1,-1|-1,1>((1,~F:1:6,T:1,D:5,F:6,^114m)*,T=1-T)[D:0..31,F:0..127,T@:0..1=0]]]></irp:irp>
    </irp:protocol>
</irp:protocols>"#;

    #[test]
    fn parse_and_find() {
        let db = ProtocolDatabase::parse_reader(DATABASE.as_bytes()).unwrap();

        assert_eq!(db.entries.len(), 2);

        let nec1 = db.find("nec").unwrap();
        assert_eq!(nec1.name, "NEC1");
        assert_eq!(nec1.alt_names, vec!["NEC"]);
        assert_eq!(nec1.relative_tolerance, 0.2);
        assert_eq!(nec1.absolute_tolerance, 100);
        assert!(nec1.decodable);
        assert!(nec1.irp.starts_with("{38.4k,564}"));

        let rc5 = db.find("rc5").unwrap();
        assert!(!rc5.decodable);
        assert_eq!(rc5.absolute_tolerance, 50);
        assert_eq!(rc5.minimum_leadout, 20000);

        let protocol = rc5.protocol().unwrap();
        assert_eq!(protocol.frequency(), 36000.0);

        assert!(db.find("sony12").is_none());
    }

    #[test]
    fn malformed() {
        assert!(ProtocolDatabase::parse_reader("<protocols><protocol>".as_bytes()).is_err());
        assert!(ProtocolDatabase::parse_reader(
            "<protocols><protocol><parameter name=\"decodable\">maybe</parameter></protocol></protocols>"
                .as_bytes()
        )
        .is_err());
    }
}
