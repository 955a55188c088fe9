//! GD3 metadata tag (version 1.00).
//!
//! Eleven UTF-16LE nul-terminated strings after a 12-byte header. The
//! Japanese variant of each paired field is left empty.

const IDENT: &[u8; 4] = b"Gd3 ";
const VERSION: u32 = 0x0100;

/// Track and game metadata for the trailing GD3 tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gd3 {
    /// Track title.
    pub track_name: String,
    /// Game title.
    pub game_name: String,
    /// Arcade system name.
    pub system_name: String,
    /// Original composer.
    pub author: String,
    /// Release date, `yyyy/mm/dd` or a prefix of it.
    pub date: String,
    /// Who produced the VGM conversion.
    pub vgm_author: String,
    /// Free-form notes.
    pub notes: String,
}

fn push_utf16(out: &mut Vec<u8>, text: &str) {
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
}

impl Gd3 {
    /// Serialize the tag, including its length header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(IDENT);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&[0; 4]); // data length, patched below

        // English/Japanese pairs, with the Japanese half empty.
        for text in [
            &self.track_name,
            &self.game_name,
            &self.system_name,
            &self.author,
        ] {
            push_utf16(&mut out, text);
            push_utf16(&mut out, "");
        }
        push_utf16(&mut out, &self.date);
        push_utf16(&mut out, &self.vgm_author);
        push_utf16(&mut out, &self.notes);

        let length = (out.len() - 12) as u32;
        out[8..12].copy_from_slice(&length.to_le_bytes());
        out
    }
}
