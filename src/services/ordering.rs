use crate::models::UploadedImage;

/// Parses the numeric filename prefix used for deterministic ordering.
///
/// Only digits before the first `_` count; anything else yields 0, so
/// unprefixed names float to the front. Callers that need strict ordering
/// must name files `{n}_{rest}`.
pub fn sort_key(filename: &str) -> u64 {
    filename
        .split('_')
        .next()
        .and_then(|prefix| prefix.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Orders uploaded images ascending by sort key, preserving the original
/// upload order among ties (stable sort).
pub fn sort_images(images: &mut [UploadedImage]) {
    images.sort_by_key(|img| img.sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn upload(name: &str) -> UploadedImage {
        UploadedImage {
            stored_path: PathBuf::from(format!("/tmp/{}", name)),
            original_filename: name.to_string(),
            dimensions: Some((100, 100)),
            sort_key: sort_key(name),
        }
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(sort_key("1_a.jpg"), 1);
        assert_eq!(sort_key("002_b.png"), 2);
        assert_eq!(sort_key("10_c.png"), 10);
        assert_eq!(sort_key("c.png"), 0);
        assert_eq!(sort_key("abc_1.png"), 0);
        assert_eq!(sort_key("12a_x.png"), 0);
        assert_eq!(sort_key(""), 0);
    }

    #[test]
    fn test_numeric_prefix_ordering() {
        let mut images = vec![upload("2_b.jpg"), upload("1_a.jpg"), upload("3_c.jpg")];
        sort_images(&mut images);

        let names: Vec<&str> = images
            .iter()
            .map(|i| i.original_filename.as_str())
            .collect();
        assert_eq!(names, vec!["1_a.jpg", "2_b.jpg", "3_c.jpg"]);
    }

    #[test]
    fn test_unprefixed_names_sort_first_and_stay_stable() {
        let mut images = vec![
            upload("5_e.jpg"),
            upload("zebra.jpg"),
            upload("apple.jpg"),
            upload("1_a.jpg"),
        ];
        sort_images(&mut images);

        let names: Vec<&str> = images
            .iter()
            .map(|i| i.original_filename.as_str())
            .collect();
        // both key-0 names keep their relative upload order
        assert_eq!(names, vec!["zebra.jpg", "apple.jpg", "1_a.jpg", "5_e.jpg"]);
    }
}
