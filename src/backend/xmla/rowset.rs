//! Parser for XMLA tabular rowsets and SOAP faults.
//!
//! A rowset response carries an inline XSD schema whose `row` complex type
//! lists the columns, followed by one `<row>` element per result row.
//! Columns missing from a row are nulls. Unknown cell elements become new
//! string columns rather than errors.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;

use crate::backend::{BackendError, Column, ColumnType, ResultTable};

/// Parse an XMLA response body into a result table or a backend error.
pub fn parse(xml: &str) -> Result<ResultTable, BackendError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = RowsetParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => parser.start(&e, false),
            Ok(Event::Empty(e)) => parser.start(&e, true),
            Ok(Event::End(e)) => parser.end(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| BackendError::Protocol(format!("invalid text content: {}", e)))?;
                parser.text(&text);
            }
            Ok(Event::CData(c)) => parser.text(&String::from_utf8_lossy(&c)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(BackendError::Protocol(format!(
                    "malformed XML at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultField {
    Code,
    String,
}

#[derive(Default)]
struct RowsetParser {
    table: ResultTable,
    column_index: HashMap<String, usize>,
    in_schema: bool,
    in_row_type: bool,
    saw_rowset: bool,
    current_row: Option<Vec<Value>>,
    current_cell: Option<(usize, String)>,
    in_fault: bool,
    fault_field: Option<FaultField>,
    fault_code: String,
    fault_string: String,
    exception: bool,
    errors: Vec<(Option<String>, String)>,
}

impl RowsetParser {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
        let name = local_name(e);

        if let Some(row) = self.current_row.as_mut() {
            if self.current_cell.is_none() {
                let idx = match self.column_index.get(&name) {
                    Some(idx) => *idx,
                    None => {
                        let idx = self.table.push_column(Column::new(decode_xml_name(&name), ColumnType::String));
                        row.push(Value::Null);
                        self.column_index.insert(name, idx);
                        idx
                    }
                };
                if !empty {
                    self.current_cell = Some((idx, String::new()));
                }
            }
            return;
        }

        match name.as_str() {
            "schema" if !empty => self.in_schema = true,
            "complexType" if self.in_schema => {
                self.in_row_type = !empty && attribute(e, "name").as_deref() == Some("row");
            }
            "element" if self.in_row_type => self.add_schema_column(e),
            "root" => self.saw_rowset = true,
            "row" if !self.in_schema => {
                let row = vec![Value::Null; self.table.column_count()];
                if empty {
                    self.table.push_row(row);
                } else {
                    self.current_row = Some(row);
                }
            }
            "Fault" => self.in_fault = true,
            "faultcode" if self.in_fault && !empty => self.fault_field = Some(FaultField::Code),
            "faultstring" if self.in_fault && !empty => self.fault_field = Some(FaultField::String),
            "Exception" => self.exception = true,
            "Error" => {
                let code = attribute(e, "ErrorCode");
                let description = attribute(e, "Description").unwrap_or_default();
                self.errors.push((code, description));
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        if let Some((idx, text)) = self.current_cell.take() {
            if let Some(row) = self.current_row.as_mut() {
                row[idx] = self.table.columns()[idx].data_type.convert(&text);
            }
            return;
        }

        match name {
            b"row" => {
                if let Some(row) = self.current_row.take() {
                    self.table.push_row(row);
                }
            }
            b"schema" => {
                self.in_schema = false;
                self.in_row_type = false;
            }
            b"complexType" => self.in_row_type = false,
            b"faultcode" | b"faultstring" => self.fault_field = None,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, cell)) = self.current_cell.as_mut() {
            cell.push_str(text);
            return;
        }
        match self.fault_field {
            Some(FaultField::Code) => self.fault_code.push_str(text.trim()),
            Some(FaultField::String) => self.fault_string.push_str(text.trim()),
            None => {}
        }
    }

    fn add_schema_column(&mut self, e: &BytesStart<'_>) {
        let Some(xml_name) = attribute(e, "name") else {
            return;
        };
        let name = attribute(e, "field").unwrap_or_else(|| decode_xml_name(&xml_name));
        let data_type = attribute(e, "type")
            .map(|t| ColumnType::from_xsd(&t))
            .unwrap_or(ColumnType::String);

        let idx = self.table.push_column(Column::new(name, data_type));
        self.column_index.insert(xml_name, idx);
    }

    fn finish(self) -> Result<ResultTable, BackendError> {
        if self.in_fault || self.exception {
            let code = self
                .errors
                .iter()
                .find_map(|(code, _)| code.clone())
                .or_else(|| (!self.fault_code.is_empty()).then(|| self.fault_code.clone()));

            let descriptions: Vec<&str> = self
                .errors
                .iter()
                .map(|(_, d)| d.as_str())
                .filter(|d| !d.is_empty())
                .collect();
            let message = if !descriptions.is_empty() {
                descriptions.join("; ")
            } else if !self.fault_string.is_empty() {
                self.fault_string
            } else {
                "backend reported an error without details".to_string()
            };

            return Err(BackendError::Query { code, message });
        }

        if !self.saw_rowset {
            return Err(BackendError::Protocol("response does not contain a rowset".to_string()));
        }

        Ok(self.table)
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Value of the first attribute whose local name is `name`.
fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Decode XML name escapes such as `_x005B_` back to the original characters.
pub fn decode_xml_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 2..];
        match decode_escape(tail) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push_str("_x");
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse `HHHH_` or `HHHHHHHH_`, returning the character and bytes consumed.
fn decode_escape(tail: &str) -> Option<(char, usize)> {
    [4usize, 8].iter().find_map(|&len| {
        let hex = tail.get(..len)?;
        if tail.as_bytes().get(len) != Some(&b'_') || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let ch = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)?;
        Some((ch, len + 1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TWO_ROWS: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
<soap:Body><ExecuteResponse xmlns="urn:schemas-microsoft-com:xml-analysis"><return>
<root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:sql="urn:schemas-microsoft-com:xml-sql">
  <xsd:schema targetNamespace="urn:schemas-microsoft-com:xml-analysis:rowset">
    <xsd:element name="root">
      <xsd:complexType><xsd:sequence minOccurs="0" maxOccurs="unbounded"><xsd:element name="row" type="row"/></xsd:sequence></xsd:complexType>
    </xsd:element>
    <xsd:complexType name="row">
      <xsd:sequence>
        <xsd:element minOccurs="0" name="_x005B_Date_x005D_._x005B_Year_x005D_._x005B_Year_x005D_._x005B_MEMBER_CAPTION_x005D_" sql:field="[Date].[Year].[Year].[MEMBER_CAPTION]" type="xsd:string"/>
        <xsd:element minOccurs="0" name="_x005B_Measures_x005D_._x005B_Amount_x005D_" sql:field="[Measures].[Amount]" type="xsd:double"/>
        <xsd:element minOccurs="0" name="_x005B_Measures_x005D_._x005B_Orders_x005D_" type="xsd:int"/>
      </xsd:sequence>
    </xsd:complexType>
  </xsd:schema>
  <row>
    <_x005B_Date_x005D_._x005B_Year_x005D_._x005B_Year_x005D_._x005B_MEMBER_CAPTION_x005D_>CY 2023</_x005B_Date_x005D_._x005B_Year_x005D_._x005B_Year_x005D_._x005B_MEMBER_CAPTION_x005D_>
    <_x005B_Measures_x005D_._x005B_Amount_x005D_>1234.5</_x005B_Measures_x005D_._x005B_Amount_x005D_>
    <_x005B_Measures_x005D_._x005B_Orders_x005D_>17</_x005B_Measures_x005D_._x005B_Orders_x005D_>
  </row>
  <row>
    <_x005B_Date_x005D_._x005B_Year_x005D_._x005B_Year_x005D_._x005B_MEMBER_CAPTION_x005D_>R&amp;D</_x005B_Date_x005D_._x005B_Year_x005D_._x005B_Year_x005D_._x005B_MEMBER_CAPTION_x005D_>
  </row>
</root>
</return></ExecuteResponse></soap:Body></soap:Envelope>"#;

    #[test]
    fn parses_schema_and_rows() {
        let table = parse(TWO_ROWS).unwrap();

        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "[Date].[Year].[Year].[MEMBER_CAPTION]",
                "[Measures].[Amount]",
                "[Measures].[Orders]",
            ]
        );
        assert_eq!(table.columns()[1].data_type, ColumnType::Double);
        assert_eq!(table.columns()[2].data_type, ColumnType::Integer);

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0], vec![json!("CY 2023"), json!(1234.5), json!(17)]);
        assert_eq!(table.rows()[1], vec![json!("R&D"), Value::Null, Value::Null]);
    }

    #[test]
    fn empty_rowset_keeps_columns() {
        let xml = r#"<root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
            <xsd:schema><xsd:complexType name="row"><xsd:sequence>
              <xsd:element name="CATALOG_NAME" type="xsd:string"/>
            </xsd:sequence></xsd:complexType></xsd:schema>
        </root>"#;
        let table = parse(xml).unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.columns()[0].name, "CATALOG_NAME");
    }

    #[test]
    fn empty_typed_cells_match_self_closing_ones() {
        let xml = r#"<root xmlns:xsd="http://www.w3.org/2001/XMLSchema">
            <xsd:schema><xsd:complexType name="row"><xsd:sequence>
              <xsd:element name="N" type="xsd:int"/>
              <xsd:element name="D" type="xsd:double"/>
            </xsd:sequence></xsd:complexType></xsd:schema>
            <row><N></N><D/></row>
            <row><N/><D></D></row>
        </root>"#;
        let table = parse(xml).unwrap();
        assert_eq!(table.rows()[0], vec![Value::Null, Value::Null]);
        assert_eq!(table.rows()[1], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn soap_fault_becomes_query_error() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
            <soap:Fault>
              <faultcode>XMLAnalysisError.0xc10a0004</faultcode>
              <faultstring>Query (1, 8) Parser: The syntax for 'x' is incorrect.</faultstring>
              <detail><Error ErrorCode="3238658057" Description="Query (1, 8) Parser: The syntax for 'x' is incorrect." Source="Analysis Services"/></detail>
            </soap:Fault></soap:Body></soap:Envelope>"#;

        assert_eq!(
            parse(xml).unwrap_err(),
            BackendError::Query {
                code: Some("3238658057".into()),
                message: "Query (1, 8) Parser: The syntax for 'x' is incorrect.".into(),
            }
        );
    }

    #[test]
    fn fault_without_detail_uses_faultstring() {
        let xml = r#"<Envelope><Body><Fault><faultcode>Server</faultcode><faultstring>boom</faultstring></Fault></Body></Envelope>"#;
        assert_eq!(
            parse(xml).unwrap_err(),
            BackendError::Query { code: Some("Server".into()), message: "boom".into() }
        );
    }

    #[test]
    fn xmla_exception_inside_root_becomes_query_error() {
        let xml = r#"<root xmlns="urn:schemas-microsoft-com:xml-analysis:empty">
            <Exception xmlns="urn:schemas-microsoft-com:xml-analysis:exception"/>
            <Messages xmlns="urn:schemas-microsoft-com:xml-analysis:exception">
              <Error ErrorCode="3239837698" Description="The 'Cube' cube was not found." Source="Microsoft SQL Server Analysis Services"/>
            </Messages></root>"#;

        assert_eq!(
            parse(xml).unwrap_err(),
            BackendError::Query {
                code: Some("3239837698".into()),
                message: "The 'Cube' cube was not found.".into(),
            }
        );
    }

    #[test]
    fn unknown_cells_add_columns() {
        let xml = r#"<root><row><A>1</A></row><row><B>x</B></row></root>"#;
        let table = parse(xml).unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.rows()[0], vec![json!("1"), Value::Null]);
        assert_eq!(table.rows()[1], vec![Value::Null, json!("x")]);
    }

    #[test]
    fn non_rowset_bodies_are_protocol_errors() {
        assert!(matches!(parse("<html><body>Gateway</body></html>"), Err(BackendError::Protocol(_))));
        assert!(matches!(parse("<root><row></root>"), Err(BackendError::Protocol(_))));
    }

    #[test]
    fn decodes_xml_names() {
        assert_eq!(decode_xml_name("_x005B_Measures_x005D_"), "[Measures]");
        assert_eq!(decode_xml_name("plain_name"), "plain_name");
        assert_eq!(decode_xml_name("a_x0020_b"), "a b");
        assert_eq!(decode_xml_name("bad_xZZZZ_"), "bad_xZZZZ_");
    }
}
