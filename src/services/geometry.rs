/// Render size for one image placement, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFit {
    pub width: f64,
    pub height: f64,
}

/// Caller-supplied overrides plus the fixed small-image threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitOptions {
    /// Explicit width/height ratio applied to every image.
    pub ratio: Option<f64>,
    /// Ratio applied instead when the intrinsic width is below the threshold.
    pub small_image_ratio: Option<f64>,
    pub small_image_threshold: u32,
}

/// Computes the size an image renders at inside the page content box.
///
/// Priority: small-image override, then the explicit ratio, then the
/// intrinsic aspect ratio. The width always starts at `max_width`; if the
/// resulting height exceeds `max_height` the size is recomputed against
/// `max_height` preserving whichever ratio was used.
pub fn fit_image(
    intrinsic: (u32, u32),
    max_width: f64,
    max_height: f64,
    options: &FitOptions,
) -> ImageFit {
    let (intrinsic_width, intrinsic_height) = intrinsic;

    let ratio = if intrinsic_width < options.small_image_threshold
        && options.small_image_ratio.is_some()
    {
        options.small_image_ratio.unwrap()
    } else if let Some(ratio) = options.ratio {
        ratio
    } else {
        intrinsic_width as f64 / intrinsic_height as f64
    };

    let width = max_width;
    let height = width / ratio;

    if height > max_height {
        ImageFit {
            width: max_height * ratio,
            height: max_height,
        }
    } else {
        ImageFit { width, height }
    }
}
