/// Identifier codec
///
/// Generates, validates and normalizes the identifier part of an ARK.
/// Hyphens are insignificant on the wire, so every identifier that reaches
/// storage goes through here and is stored without them.
use uuid::Uuid;

/// Length of a stored identifier
pub const IDENTIFIER_LENGTH: usize = 12;

/// Hex digits in a UUID once hyphens are removed
const UUID_HEX_LENGTH: usize = 32;

/// Hex group widths of the canonical UUID form
const UUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Shoulder and identifier recovered from a resolution path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSuffix {
    pub shoulder: String,
    pub identifier: String,
}

/// Why a resolution path could not be normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFormat(pub String);

/// Generate a fresh identifier from a random UUIDv4
pub fn generate() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..IDENTIFIER_LENGTH].to_string()
}

/// True iff `s` is a canonical 8-4-4-4-12 UUID with version 4 and an RFC 4122 variant
pub fn is_full_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    if groups.len() != UUID_GROUPS.len() {
        return false;
    }

    let shaped = groups
        .iter()
        .zip(UUID_GROUPS)
        .all(|(group, width)| group.len() == width && group.chars().all(|c| c.is_ascii_hexdigit()));
    if !shaped {
        return false;
    }

    let version = groups[2].as_bytes()[0];
    let variant = groups[3].as_bytes()[0].to_ascii_lowercase();
    version == b'4' && matches!(variant, b'8' | b'9' | b'a' | b'b')
}

/// True iff `s` is exactly 12 lowercase hex characters
pub fn is_short_identifier(s: &str) -> bool {
    s.len() == IDENTIFIER_LENGTH && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

/// Strip hyphens from a validated UUIDv4 and keep the first 12 characters
pub fn derive_from_uuid(uuid: &str) -> String {
    uuid.chars()
        .filter(|c| *c != '-')
        .take(IDENTIFIER_LENGTH)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Regroup 32 hex digits into the 8-4-4-4-12 form
fn regroup_uuid(hex: &str) -> String {
    let mut grouped = String::with_capacity(UUID_HEX_LENGTH + UUID_GROUPS.len() - 1);
    let mut offset = 0;
    for (i, width) in UUID_GROUPS.iter().enumerate() {
        if i > 0 {
            grouped.push('-');
        }
        grouped.push_str(&hex[offset..offset + width]);
        offset += width;
    }
    grouped
}

/// Split the shoulder off a raw resolution suffix and canonicalize the rest
///
/// The remainder may carry hyphens anywhere. Once they are stripped it must be
/// either a full UUIDv4 (32 hex digits, reduced to its 12-character identifier)
/// or an identifier that is already short.
pub fn normalize_resolution_path(
    raw_suffix: &str,
    shoulder_length: usize,
) -> Result<NormalizedSuffix, InvalidFormat> {
    if raw_suffix.is_empty() {
        return Err(InvalidFormat("Identifier is empty.".to_string()));
    }

    let split = raw_suffix
        .char_indices()
        .nth(shoulder_length)
        .map(|(idx, _)| idx)
        .ok_or_else(|| InvalidFormat(format!("Identifier {} is too short.", raw_suffix)))?;
    let (shoulder, remainder) = raw_suffix.split_at(split);

    if !shoulder.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(InvalidFormat(format!("Shoulder in {} is malformed.", raw_suffix)));
    }

    let stripped: String = remainder.chars().filter(|c| *c != '-').collect();

    let identifier = if stripped.len() == UUID_HEX_LENGTH && stripped.is_ascii() {
        let grouped = regroup_uuid(&stripped);
        if !is_full_uuid(&grouped) {
            return Err(InvalidFormat(format!("Identifier {} is not a valid UUID.", remainder)));
        }
        derive_from_uuid(&grouped)
    } else if is_short_identifier(&stripped) {
        stripped
    } else {
        return Err(InvalidFormat(format!("Identifier {} is malformed.", remainder)));
    };

    Ok(NormalizedSuffix {
        shoulder: shoulder.to_string(),
        identifier,
    })
}
