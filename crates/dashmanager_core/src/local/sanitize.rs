//! Snapshot sanitizers applied before local writes.
//!
//! # Invariants
//! - Text caps count Unicode scalar values, never bytes.
//! - Inline images above the byte threshold are re-encoded as JPEG no wider
//!   than `max_image_width`; undecodable ones are dropped.
//! - Remote image URLs are never touched.

use super::LocalStoreLimits;
use crate::model::group::Group;
use crate::model::location::Location;
use crate::model::person::Person;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, GenericImageView};
use log::warn;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_PHONE_CHARS: usize = 32;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_ADDRESS_CHARS: usize = 300;

pub fn sanitize_person(person: &Person, limits: &LocalStoreLimits) -> Person {
    Person {
        id: person.id.clone(),
        name: truncate_chars(&person.name, MAX_NAME_CHARS),
        email: truncate_chars(&person.email, MAX_EMAIL_CHARS),
        phone: person
            .phone
            .as_deref()
            .map(|phone| truncate_chars(phone, MAX_PHONE_CHARS)),
        bio: person
            .bio
            .as_deref()
            .map(|bio| truncate_chars(bio, MAX_BIO_CHARS)),
        avatar: person
            .avatar
            .as_deref()
            .and_then(|avatar| shrink_inline_image(avatar, limits)),
    }
}

pub fn sanitize_group(group: &Group, limits: &LocalStoreLimits) -> Group {
    Group {
        id: group.id.clone(),
        name: truncate_chars(&group.name, MAX_NAME_CHARS),
        description: group
            .description
            .as_deref()
            .map(|description| truncate_chars(description, MAX_DESCRIPTION_CHARS)),
        members: group.members.clone(),
        avatar: group
            .avatar
            .as_deref()
            .and_then(|avatar| shrink_inline_image(avatar, limits)),
        updated_at: group.updated_at,
    }
}

pub fn sanitize_location(location: &Location, _limits: &LocalStoreLimits) -> Location {
    Location {
        name: truncate_chars(&location.name, MAX_NAME_CHARS),
        address: truncate_chars(&location.address, MAX_ADDRESS_CHARS),
        ..location.clone()
    }
}

pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Returns the image reference to persist, downscaling oversized inline data.
///
/// Returns `None` when an oversized inline payload cannot be decoded.
pub fn shrink_inline_image(value: &str, limits: &LocalStoreLimits) -> Option<String> {
    if !value.starts_with("data:") || value.len() <= limits.max_inline_image_bytes {
        return Some(value.to_string());
    }

    match downscale_data_url(value, limits) {
        Ok(shrunk) => Some(shrunk),
        Err(err) => {
            warn!(
                "event=image_shrink module=local status=error bytes={} error={}",
                value.len(),
                err
            );
            None
        }
    }
}

fn downscale_data_url(value: &str, limits: &LocalStoreLimits) -> Result<String, String> {
    let (_, payload) = value
        .split_once(";base64,")
        .ok_or_else(|| "inline image is not base64 encoded".to_string())?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| format!("invalid base64 payload: {err}"))?;
    let decoded =
        image::load_from_memory(&bytes).map_err(|err| format!("undecodable image: {err}"))?;

    let (width, height) = decoded.dimensions();
    let resized = if width > limits.max_image_width {
        let scaled_height = (u64::from(height) * u64::from(limits.max_image_width)
            / u64::from(width))
        .max(1) as u32;
        decoded.resize_exact(limits.max_image_width, scaled_height, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = resized.to_rgb8();
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, limits.jpeg_quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|err| format!("jpeg encode failed: {err}"))?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(encoded)))
}

#[cfg(test)]
mod tests {
    use super::{sanitize_person, shrink_inline_image, truncate_chars, MAX_BIO_CHARS};
    use crate::local::LocalStoreLimits;
    use crate::model::person::PersonDraft;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use image::codecs::png::PngEncoder;
    use image::{ColorType, GenericImageView, ImageEncoder, RgbImage};

    fn noisy_png_data_url(width: u32, height: u32) -> String {
        let mut state: u32 = 0x1234_5678;
        let image = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let bytes = state.to_le_bytes();
            image::Rgb([bytes[1], bytes[2], bytes[3]])
        });
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(image.as_raw(), width, height, ColorType::Rgb8)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("ação", 2), "aç");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    #[test]
    fn small_and_remote_images_are_kept() {
        let limits = LocalStoreLimits::default();
        let url = "https://cdn.example.com/avatar.png";
        assert_eq!(shrink_inline_image(url, &limits).as_deref(), Some(url));
        let small = "data:image/png;base64,AAAA";
        assert_eq!(shrink_inline_image(small, &limits).as_deref(), Some(small));
    }

    #[test]
    fn oversized_inline_image_is_downscaled_to_width_bound() {
        let limits = LocalStoreLimits::default();
        let original = noisy_png_data_url(640, 480);
        assert!(original.len() > limits.max_inline_image_bytes);

        let shrunk = shrink_inline_image(&original, &limits).expect("image should re-encode");
        assert!(shrunk.starts_with("data:image/jpeg;base64,"));
        assert!(shrunk.len() < original.len());

        let payload = shrunk.trim_start_matches("data:image/jpeg;base64,");
        let decoded = image::load_from_memory(&STANDARD.decode(payload).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (320, 240));
    }

    #[test]
    fn undecodable_oversized_payload_is_dropped() {
        let limits = LocalStoreLimits {
            max_inline_image_bytes: 8,
            ..LocalStoreLimits::default()
        };
        let garbage = format!("data:image/png;base64,{}", STANDARD.encode([7u8; 64]));
        assert_eq!(shrink_inline_image(&garbage, &limits), None);
    }

    #[test]
    fn person_text_fields_are_capped() {
        let mut draft = PersonDraft::new("Ana", "ana@example.com");
        draft.bio = Some("x".repeat(MAX_BIO_CHARS + 50));
        let person = draft.into_person_with_id("p1".to_string());
        let sanitized = sanitize_person(&person, &LocalStoreLimits::default());
        assert_eq!(sanitized.bio.map(|bio| bio.chars().count()), Some(MAX_BIO_CHARS));
    }
}
