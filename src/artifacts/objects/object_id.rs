//! Object identifiers
//!
//! An id is the lowercase hex SHA-1 of an object's canonical bytes. On disk the
//! object lives at `objects/<first 2 chars>/<remaining 38 chars>`; inside trees
//! and index entries the id is packed into 20 raw bytes.

use crate::artifacts::objects::{OBJECT_ID_LENGTH, SHORT_OBJECT_ID_LENGTH};
use sha1::{Digest, Sha1};
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate a full 40-character hex id
    pub fn try_parse(id: String) -> anyhow::Result<Self> {
        if id.len() != OBJECT_ID_LENGTH {
            anyhow::bail!("invalid object id length {} for '{}'", id.len(), id);
        }
        if !Self::is_hex(&id) {
            anyhow::bail!("invalid object id characters in '{}'", id);
        }

        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Hash arbitrary bytes (already in canonical object form)
    pub fn hash_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);

        Self(format!("{:x}", hasher.finalize()))
    }

    /// Whether the string has the shape of a full object id
    pub fn looks_like_oid(candidate: &str) -> bool {
        candidate.len() == OBJECT_ID_LENGTH && Self::is_hex(candidate)
    }

    fn is_hex(candidate: &str) -> bool {
        candidate.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Pack the id into 20 raw bytes
    pub fn write_h40_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        let hex40 = self.as_ref();

        for i in (0..OBJECT_ID_LENGTH).step_by(2) {
            let byte = u8::from_str_radix(&hex40[i..i + 2], 16)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid hex digit"))?;
            writer.write_all(&[byte])?;
        }

        Ok(())
    }

    /// Read 20 raw bytes back into a hex id
    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_LENGTH / 2];
        reader.read_exact(&mut raw)?;

        let hex40 = raw.iter().map(|byte| format!("{byte:02x}")).collect();
        Self::try_parse(hex40)
    }

    /// Fan-out path of the object relative to the objects directory
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    pub fn to_short_oid(&self) -> String {
        self.0[..SHORT_OBJECT_ID_LENGTH].to_string()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("zz013625030ba8dba906f756967f9e9ca394464a")]
    #[case("ce013625030ba8dba906f756967f9e9ca394464a0")]
    fn rejects_malformed_ids(#[case] candidate: &str) {
        assert!(ObjectId::try_parse(candidate.to_string()).is_err());
    }

    #[test]
    fn fan_out_path_splits_after_two_chars() {
        let oid = ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a".into()).unwrap();

        pretty_assertions::assert_eq!(
            oid.to_path(),
            PathBuf::from("ce").join("013625030ba8dba906f756967f9e9ca394464a")
        );
        pretty_assertions::assert_eq!(oid.to_short_oid(), "ce01362");
    }

    proptest! {
        #[test]
        fn packed_form_preserves_the_id(hex in "[0-9a-f]{40}") {
            let oid = ObjectId::try_parse(hex.clone()).unwrap();
            let mut packed = Vec::new();
            oid.write_h40_to(&mut packed).unwrap();

            assert_eq!(packed.len(), 20);
            let unpacked = ObjectId::read_h40_from(&mut packed.as_slice()).unwrap();
            assert_eq!(unpacked.as_ref(), hex.as_str());
        }

        #[test]
        fn equal_content_hashes_to_equal_ids(content in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            assert_eq!(ObjectId::hash_bytes(&content), ObjectId::hash_bytes(&content.clone()));
        }

        #[test]
        fn different_content_hashes_to_different_ids(
            a in proptest::collection::vec(proptest::num::u8::ANY, 0..64),
            b in proptest::collection::vec(proptest::num::u8::ANY, 0..64)
        ) {
            proptest::prop_assume!(a != b);
            assert_ne!(ObjectId::hash_bytes(&a), ObjectId::hash_bytes(&b));
        }
    }
}
