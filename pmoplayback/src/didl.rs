//! DIDL-Lite metadata codec.
//!
//! Renderers echo the metadata of what they play as a DIDL-Lite document, and
//! `SetAVTransportURI` / `SetNextAVTransportURI` expect one alongside the URI.

use quick_xml::escape::escape;
use serde::Deserialize;
use tracing::debug;

use crate::model::MediaEntry;

/// Translates between device metadata blobs and [`MediaEntry`] values.
pub trait MetadataCodec: Send + Sync {
    /// Decodes every object of a metadata blob. Unreadable input gives an empty list.
    fn decode(&self, metadata: &str) -> Vec<MediaEntry>;

    /// Builds the metadata string sent along with the entry's URI.
    fn encode(&self, entry: &MediaEntry) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DidlLiteCodec;

// Structures de désérialisation (uniquement les champs utiles au lecteur)

#[derive(Debug, Deserialize)]
#[serde(rename = "DIDL-Lite")]
struct DidlDocument {
    #[serde(rename = "container", default)]
    containers: Vec<DidlObject>,
    #[serde(rename = "item", default)]
    items: Vec<DidlObject>,
}

#[derive(Debug, Deserialize)]
struct DidlObject {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@parentID", default)]
    parent_id: String,
    #[serde(rename = "@refID", default)]
    ref_id: Option<String>,
    #[serde(rename = "dc:title", alias = "title", default)]
    title: Option<String>,
    #[serde(rename = "upnp:class", alias = "class", default)]
    class: Option<String>,
    #[serde(rename = "dc:creator", alias = "creator", default)]
    creators: Vec<Text>,
    #[serde(rename = "upnp:artist", alias = "artist", default)]
    artists: Vec<Text>,
    #[serde(rename = "upnp:album", alias = "album", default)]
    albums: Vec<Text>,
    #[serde(rename = "upnp:genre", alias = "genre", default)]
    genres: Vec<Text>,
    #[serde(rename = "dc:publisher", alias = "publisher", default)]
    publishers: Vec<Text>,
    #[serde(rename = "upnp:albumArtURI", alias = "albumArtURI", default)]
    album_art: Vec<Text>,
    #[serde(rename = "upnp:originalTrackNumber", alias = "originalTrackNumber", default)]
    track_number: Option<String>,
    #[serde(rename = "res", default)]
    resources: Vec<DidlResource>,
}

/// Element whose attributes (e.g. `role`) are ignored.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct DidlResource {
    #[serde(rename = "@protocolInfo", default)]
    protocol_info: String,
    #[serde(rename = "$text", default)]
    uri: String,
}

fn first(values: &[Text]) -> Option<String> {
    values
        .iter()
        .map(|t| t.value.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

impl DidlObject {
    fn into_entry(self, is_container: bool) -> MediaEntry {
        let title = self.title.unwrap_or_default();
        let mut entry = if is_container {
            MediaEntry::container(self.id, self.parent_id, title)
        } else {
            MediaEntry::item(self.id, self.parent_id, title)
        };

        if let Some(class) = self.class.filter(|c| !c.trim().is_empty()) {
            entry = entry.with_class(class.trim());
        }
        if let Some(ref_id) = self.ref_id.filter(|r| !r.is_empty()) {
            entry = entry.with_ref_id(ref_id);
        }
        if let Some(res) = self.resources.into_iter().next() {
            entry = entry.with_resource(res.uri.trim(), res.protocol_info);
        }
        if let Some(album) = first(&self.albums) {
            entry = entry.with_album(album);
        }
        if let Some(artist) = first(&self.artists) {
            entry = entry.with_artist(artist);
        }
        if let Some(genre) = first(&self.genres) {
            entry = entry.with_genre(genre);
        }
        if let Some(publisher) = first(&self.publishers) {
            entry = entry.with_publisher(publisher);
        }
        if let Some(creator) = first(&self.creators) {
            entry = entry.with_creator(creator);
        }
        if let Some(art) = first(&self.album_art) {
            entry = entry.with_album_art_uri(art);
        }
        if let Some(n) = self.track_number.and_then(|n| n.trim().parse::<u32>().ok()) {
            entry = entry.with_track_number(n);
        }
        entry
    }
}

fn optional_element(name: &str, value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .map(|v| format!("<{name}>{}</{name}>", escape(v)))
        .unwrap_or_default()
}

impl MetadataCodec for DidlLiteCodec {
    fn decode(&self, metadata: &str) -> Vec<MediaEntry> {
        let trimmed = metadata.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NOT_IMPLEMENTED") {
            return Vec::new();
        }

        match quick_xml::de::from_str::<DidlDocument>(trimmed) {
            Ok(doc) => doc
                .containers
                .into_iter()
                .map(|c| c.into_entry(true))
                .chain(doc.items.into_iter().map(|i| i.into_entry(false)))
                .collect(),
            Err(err) => {
                debug!(error = %err, "Unreadable DIDL-Lite metadata");
                Vec::new()
            }
        }
    }

    fn encode(&self, entry: &MediaEntry) -> String {
        let tag = if entry.is_container() { "container" } else { "item" };
        let ref_id = entry
            .ref_id()
            .map(|r| format!(r#" refID="{}""#, escape(r)))
            .unwrap_or_default();
        let resource = if entry.resource_uri().is_empty() {
            String::new()
        } else {
            format!(
                r#"<res protocolInfo="{}">{}</res>"#,
                escape(entry.protocol_info()),
                escape(entry.resource_uri())
            )
        };
        let track_number = entry.track_number().map(|n| n.to_string());

        format!(
            r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><{tag} id="{}" parentID="{}"{} restricted="1"><dc:title>{}</dc:title>{}{}{}{}{}{}{}<upnp:class>{}</upnp:class>{}</{tag}></DIDL-Lite>"#,
            escape(entry.id()),
            escape(entry.parent_id()),
            ref_id,
            escape(entry.title()),
            optional_element("dc:creator", entry.creator()),
            optional_element("upnp:artist", entry.artist()),
            optional_element("upnp:album", entry.album()),
            optional_element("upnp:genre", entry.genre()),
            optional_element("dc:publisher", entry.publisher()),
            optional_element("upnp:albumArtURI", entry.album_art_uri()),
            optional_element("upnp:originalTrackNumber", track_number.as_deref()),
            escape(entry.upnp_class()),
            resource,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
<item id="t1" parentID="a1" restricted="1">
<dc:title>So What</dc:title>
<dc:creator>Miles Davis</dc:creator>
<upnp:artist role="Performer">Miles Davis</upnp:artist>
<upnp:album>Kind of Blue</upnp:album>
<upnp:genre>Jazz</upnp:genre>
<upnp:albumArtURI>http://server/art/a1.jpg</upnp:albumArtURI>
<upnp:originalTrackNumber>1</upnp:originalTrackNumber>
<upnp:class>object.item.audioItem.musicTrack</upnp:class>
<res protocolInfo="http-get:*:audio/flac:*">http://server/t1.flac?a=1&amp;b=2</res>
</item>
</DIDL-Lite>"#;

    #[test]
    fn decodes_item_fields() {
        let entries = DidlLiteCodec.decode(SAMPLE);
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.id(), "t1");
        assert_eq!(entry.parent_id(), "a1");
        assert_eq!(entry.title(), "So What");
        assert_eq!(entry.artist(), Some("Miles Davis"));
        assert_eq!(entry.album(), Some("Kind of Blue"));
        assert_eq!(entry.genre(), Some("Jazz"));
        assert_eq!(entry.track_number(), Some(1));
        assert_eq!(entry.album_art_uri(), Some("http://server/art/a1.jpg"));
        assert_eq!(entry.resource_uri(), "http://server/t1.flac?a=1&b=2");
        assert_eq!(entry.protocol_info(), "http-get:*:audio/flac:*");
        assert!(!entry.is_container());
    }

    #[test]
    fn unreadable_metadata_decodes_to_nothing() {
        assert!(DidlLiteCodec.decode("").is_empty());
        assert!(DidlLiteCodec.decode("NOT_IMPLEMENTED").is_empty());
        assert!(DidlLiteCodec.decode("<not-didl").is_empty());
    }

    #[test]
    fn encode_escapes_and_skips_missing_fields() {
        let entry = MediaEntry::item("id&1", "p", "Rock & Roll")
            .with_resource("http://h/x?a=1&b=2", "http-get:*:audio/mpeg:*");
        let xml = DidlLiteCodec.encode(&entry);

        assert!(xml.contains("<dc:title>Rock &amp; Roll</dc:title>"));
        assert!(xml.contains(r#"id="id&amp;1""#));
        assert!(xml.contains(">http://h/x?a=1&amp;b=2</res>"));
        assert!(!xml.contains("upnp:album"));
    }

    #[test]
    fn encoded_entry_reads_back() {
        let entry = MediaEntry::item("t9", "a9", "Blue in Green")
            .with_artist("Bill Evans")
            .with_album("Kind of Blue")
            .with_track_number(3)
            .with_resource("http://server/t9.flac", "http-get:*:audio/flac:*");

        let decoded = DidlLiteCodec.decode(&DidlLiteCodec.encode(&entry));
        assert_eq!(decoded, vec![entry]);
    }
}
