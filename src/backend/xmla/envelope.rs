//! SOAP request bodies for the XMLA `Discover` and `Execute` methods.

use quick_xml::escape::escape;

use crate::backend::xmla::XMLA_NAMESPACE;
use crate::backend::ConnectionDescriptor;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// XMLA method carried by a request, used for the SOAPAction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Discover,
    Execute,
}

impl Method {
    pub fn soap_action(self) -> String {
        let name = match self {
            Method::Discover => "Discover",
            Method::Execute => "Execute",
        };
        format!("\"{}:{}\"", XMLA_NAMESPACE, name)
    }
}

/// `Discover DBSCHEMA_CATALOGS` restricted to the descriptor's catalog.
///
/// Used as the connection handshake: it proves the endpoint is reachable,
/// the credentials are accepted and the catalog exists.
pub fn discover_catalog(descriptor: &ConnectionDescriptor) -> String {
    let body = format!(
        "<Discover xmlns=\"{ns}\">\
           <RequestType>DBSCHEMA_CATALOGS</RequestType>\
           <Restrictions><RestrictionList>\
             <CATALOG_NAME>{catalog}</CATALOG_NAME>\
           </RestrictionList></Restrictions>\
           <Properties><PropertyList>{properties}</PropertyList></Properties>\
         </Discover>",
        ns = XMLA_NAMESPACE,
        catalog = escape(descriptor.catalog.as_str()),
        properties = session_properties(descriptor, false),
    );
    wrap(&body)
}

/// `Execute` of `statement` with the descriptor's session properties.
pub fn execute(descriptor: &ConnectionDescriptor, statement: &str) -> String {
    let body = format!(
        "<Execute xmlns=\"{ns}\">\
           <Command><Statement>{statement}</Statement></Command>\
           <Properties><PropertyList>{properties}</PropertyList></Properties>\
         </Execute>",
        ns = XMLA_NAMESPACE,
        statement = escape(statement),
        properties = session_properties(descriptor, true),
    );
    wrap(&body)
}

fn session_properties(descriptor: &ConnectionDescriptor, with_catalog: bool) -> String {
    let mut properties = String::new();
    if with_catalog {
        properties.push_str(&format!("<Catalog>{}</Catalog>", escape(descriptor.catalog.as_str())));
    }
    properties.push_str(&format!(
        "<LocaleIdentifier>{}</LocaleIdentifier>\
         <Timeout>{}</Timeout>\
         <SspropInitAppName>{}</SspropInitAppName>\
         <Format>Tabular</Format>\
         <Content>SchemaData</Content>\
         <MdxMissingMemberMode>{}</MdxMissingMemberMode>\
         <DbpropMsmdMDXCompatibility>{}</DbpropMsmdMDXCompatibility>\
         <VisualMode>{}</VisualMode>",
        descriptor.locale_id,
        descriptor.timeout_secs,
        escape(descriptor.application_name.as_str()),
        ConnectionDescriptor::MISSING_MEMBER_MODE,
        ConnectionDescriptor::MDX_COMPATIBILITY,
        ConnectionDescriptor::VISUAL_MODE,
    ));
    properties
}

fn wrap(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"{}\"><soap:Body>{}</soap:Body></soap:Envelope>",
        SOAP_ENVELOPE_NS, body
    )
}
