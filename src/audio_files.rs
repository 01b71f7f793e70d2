use std::path::Path;

/// Audio extensions eligible for track-data generation (lowercase, without dots).
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 3] = ["wav", "mp3", "ogg"];

/// Return true if the path has a supported audio extension.
pub fn is_supported_audio(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    SUPPORTED_AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

/// Return true if the file name (not a full path) has a supported audio extension.
pub fn is_supported_audio_name(name: &str) -> bool {
    is_supported_audio(Path::new(name))
}
