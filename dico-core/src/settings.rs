use dico_types::{
    DEFAULT_LOCALE, DEFAULT_MAX_PLAYERS, DEFAULT_TIMEOUT_SECONDS, MAX_PLAYERS_LIMIT,
    MAX_TIMEOUT_SECONDS, MIN_NAME_LENGTH, MIN_PLAYERS_LIMIT, MIN_TIMEOUT_SECONDS, Player, Room,
    RoomError, RoomId, RoomSettings, RoomStatus,
};
use rand::Rng;

pub const CODE_LENGTH: usize = 6;

// No 0/O or 1/I so codes survive being read out loud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a join code for a private room.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form a code is stored and compared in.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn codes_match(stored: &str, provided: &str) -> bool {
    normalize_code(stored) == normalize_code(provided)
}

fn validate_locale(locale: &str) -> Result<String, RoomError> {
    let locale = locale.trim().to_lowercase();
    if locale.len() == 2 && locale.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(locale)
    } else {
        Err(RoomError::Validation(format!(
            "locale must be an ISO 639-1 code, got '{}'",
            locale
        )))
    }
}

/// Build a new room in `Created` status after validating the settings.
/// The owner is the first member of both rosters.
pub fn build_room<R: Rng + ?Sized>(
    owner: &Player,
    settings: &RoomSettings,
    rng: &mut R,
) -> Result<Room, RoomError> {
    let name = settings.name.trim().to_string();
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(RoomError::Validation(format!(
            "name must be at least {} characters",
            MIN_NAME_LENGTH
        )));
    }

    let max_players = settings.max_players.unwrap_or(DEFAULT_MAX_PLAYERS);
    if !(MIN_PLAYERS_LIMIT..=MAX_PLAYERS_LIMIT).contains(&max_players) {
        return Err(RoomError::Validation(format!(
            "max_players must be between {} and {}",
            MIN_PLAYERS_LIMIT, MAX_PLAYERS_LIMIT
        )));
    }

    let timeout_seconds = settings.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&timeout_seconds) {
        return Err(RoomError::Validation(format!(
            "timeout_seconds must be between {} and {}",
            MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS
        )));
    }

    let locale = validate_locale(settings.locale.as_deref().unwrap_or(DEFAULT_LOCALE))?;
    let is_private = settings.is_private.unwrap_or(false);
    let now = chrono::Utc::now().to_rfc3339();

    Ok(Room {
        id: RoomId::new(),
        name,
        owner_id: owner.id,
        max_players,
        is_private,
        code: is_private.then(|| generate_code(rng)),
        is_ranked: settings.is_ranked.unwrap_or(false),
        locale,
        timeout_seconds,
        status: RoomStatus::Created,
        players_ids: vec![owner.id],
        connected_players_ids: vec![owner.id],
        rounds: Vec::new(),
        version: 0,
        created_at: now.clone(),
        updated_at: now,
    })
}
