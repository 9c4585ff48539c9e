// NETCONF XML payloads: hello exchange, <get-config>, and reply parsing.

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::reader::Reader;

use super::Datastore;
use crate::error::Error;

pub const BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
pub const CAP_BASE_10: &str = "urn:ietf:params:netconf:base:1.0";
pub const CAP_BASE_11: &str = "urn:ietf:params:netconf:base:1.1";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// What the device told us in its `<hello>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHello {
    pub session_id: Option<String>,
    pub capabilities: Vec<String>,
}

impl ServerHello {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Client `<hello>` advertising base:1.0, base:1.1 and `extra` capabilities.
pub fn client_hello(extra: &[&str]) -> String {
    let capabilities: String = [CAP_BASE_10, CAP_BASE_11]
        .iter()
        .chain(extra)
        .map(|c| format!("<capability>{c}</capability>"))
        .collect();
    format!(r#"{XML_DECL}<hello xmlns="{BASE_NS}"><capabilities>{capabilities}</capabilities></hello>"#)
}

/// `<rpc>` wrapping `<get-config>` on `source`.
pub fn get_config(message_id: u32, source: Datastore) -> String {
    format!(
        r#"{XML_DECL}<rpc message-id="{message_id}" xmlns="{BASE_NS}"><get-config><source><{source}/></source></get-config></rpc>"#
    )
}

/// `<rpc>` wrapping `<close-session>`.
pub fn close_session(message_id: u32) -> String {
    format!(r#"{XML_DECL}<rpc message-id="{message_id}" xmlns="{BASE_NS}"><close-session/></rpc>"#)
}

fn xml_error(e: &quick_xml::Error) -> Error {
    Error::Reply(format!("XML parse error: {e}"))
}

fn to_offset(pos: impl TryInto<usize>) -> Result<usize, Error> {
    pos.try_into()
        .map_err(|_| Error::Reply("reply offset out of range".into()))
}

/// Back up to the `<` opening the tag read at `pos`.
fn tag_start(xml: &str, pos: usize) -> usize {
    if xml[pos..].starts_with('<') {
        pos
    } else {
        xml[..pos].rfind('<').unwrap_or(pos)
    }
}

/// Parse the server `<hello>`.
pub fn parse_hello(xml: &str) -> Result<ServerHello, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut hello = ServerHello::default();
    let mut saw_hello = false;
    let mut current = Vec::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(&e))? {
            Event::Start(e) => {
                let local = e.local_name();
                if local.as_ref() == b"hello" {
                    saw_hello = true;
                }
                current = local.as_ref().to_vec();
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| xml_error(&e))?.trim().to_owned();
                match current.as_slice() {
                    b"capability" => hello.capabilities.push(text),
                    b"session-id" => hello.session_id = Some(text),
                    _ => {}
                }
            }
            Event::End(_) => current.clear(),
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_hello {
        return Err(Error::Reply("expected <hello> from server".into()));
    }
    Ok(hello)
}

/// Collect `<error-message>` (or `<error-tag>`) texts from every `<rpc-error>`.
fn rpc_errors(xml: &str) -> Result<Vec<String>, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut errors = Vec::new();
    let mut in_error = false;
    let mut tag = None;
    let mut message = None;
    let mut current = Vec::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(&e))? {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"rpc-error" {
                    in_error = true;
                    tag = None;
                    message = None;
                }
                current = local;
            }
            Event::Text(t) if in_error => {
                let text = t.unescape().map_err(|e| xml_error(&e))?.trim().to_owned();
                match current.as_slice() {
                    b"error-tag" => tag = Some(text),
                    b"error-message" => message = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"rpc-error" {
                    in_error = false;
                    errors.push(
                        message
                            .take()
                            .or_else(|| tag.take())
                            .unwrap_or_else(|| "unspecified rpc-error".into()),
                    );
                }
                current.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(errors)
}

/// Extract the `<data>` element of a `<get-config>` reply, verbatim.
///
/// The returned slice keeps the element's own tag and namespace
/// declarations so it stays a standalone XML document. An empty
/// `<data/>` is returned as-is.
pub fn parse_data_reply(xml: &str) -> Result<String, Error> {
    let errors = rpc_errors(xml)?;
    if !errors.is_empty() {
        return Err(Error::Rpc(errors.join("; ")));
    }

    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;

    loop {
        let start = to_offset(reader.buffer_position())?;
        match reader.read_event().map_err(|e| xml_error(&e))? {
            Event::Start(e) => {
                if depth == 1 && e.local_name().as_ref() == b"data" {
                    let name = e.name().as_ref().to_vec();
                    reader
                        .read_to_end(QName(&name))
                        .map_err(|e| xml_error(&e))?;
                    let end = to_offset(reader.buffer_position())?;
                    return Ok(xml[tag_start(xml, start)..end].to_owned());
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && e.local_name().as_ref() == b"data" {
                    let end = to_offset(reader.buffer_position())?;
                    return Ok(xml[tag_start(xml, start)..end].to_owned());
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::Reply("no <data> element in get-config reply".into()))
}

/// Check a reply that should be `<ok/>`.
pub fn expect_ok(xml: &str) -> Result<(), Error> {
    let errors = rpc_errors(xml)?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Rpc(errors.join("; ")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
    <capability>urn:ietf:params:netconf:base:1.1</capability>
    <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>
  </capabilities>
  <session-id>4711</session-id>
</hello>"#;

    #[test]
    fn hello_lists_capabilities_and_session() {
        let hello = parse_hello(HELLO).unwrap();
        assert_eq!(hello.session_id.as_deref(), Some("4711"));
        assert_eq!(hello.capabilities.len(), 3);
        assert!(hello.supports(CAP_BASE_11));
    }

    #[test]
    fn hello_rejects_other_documents() {
        assert!(matches!(parse_hello("<rpc-reply/>"), Err(Error::Reply(_))));
    }

    #[test]
    fn client_hello_carries_platform_capabilities() {
        let hello = client_hello(&["http://xml.juniper.net/netconf/junos/1.0"]);
        assert!(hello.contains("<capability>urn:ietf:params:netconf:base:1.1</capability>"));
        assert!(hello.contains("junos/1.0</capability>"));
    }

    #[test]
    fn get_config_names_datastore() {
        let rpc = get_config(101, Datastore::Running);
        assert!(rpc.contains(r#"message-id="101""#));
        assert!(rpc.contains("<source><running/></source>"));
    }

    #[test]
    fn data_element_is_extracted_verbatim() {
        let reply = r#"<?xml version="1.0"?>
<rpc-reply message-id="101" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <data><native xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-native"><hostname>pe1</hostname></native></data>
</rpc-reply>"#;
        assert_eq!(
            parse_data_reply(reply).unwrap(),
            r#"<data><native xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-native"><hostname>pe1</hostname></native></data>"#
        );
    }

    #[test]
    fn empty_data_element_is_accepted() {
        let reply = r#"<nc:rpc-reply xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0"><nc:data/></nc:rpc-reply>"#;
        assert_eq!(parse_data_reply(reply).unwrap(), "<nc:data/>");
    }

    #[test]
    fn nested_data_elements_are_not_mistaken_for_the_reply() {
        let reply = r#"<rpc-reply><ok><data>inner</data></ok></rpc-reply>"#;
        assert!(matches!(parse_data_reply(reply), Err(Error::Reply(_))));
    }

    #[test]
    fn rpc_error_message_is_surfaced() {
        let reply = r#"<rpc-reply><rpc-error><error-type>application</error-type><error-tag>access-denied</error-tag><error-message>not authorized</error-message></rpc-error></rpc-reply>"#;
        match parse_data_reply(reply) {
            Err(Error::Rpc(msg)) => assert_eq!(msg, "not authorized"),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn ok_reply_passes() {
        expect_ok("<rpc-reply><ok/></rpc-reply>").unwrap();
        assert!(expect_ok("<rpc-reply><rpc-error><error-tag>in-use</error-tag></rpc-error></rpc-reply>").is_err());
    }
}
