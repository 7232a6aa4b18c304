//! Built-in candidate tag vocabulary.
//!
//! Duplicates are tolerated here; `Vocabulary` deduplicates on construction.

pub(crate) const BASE_TAGS: &[&str] = &[
    // Photographic styles and genres
    "landscape",
    "portrait",
    "street photography",
    "documentary",
    "travel photography",
    "macro",
    "architectural",
    "wildlife",
    "sports photography",
    "event photography",
    "fine art photography",
    "still life",
    "food photography",
    "product photography",
    "astrophotography",
    "underwater photography",
    "aerial photography",
    "fashion photography",
    "urban exploration",
    "concert photography",
    // Composition and framing
    "wide angle",
    "close-up",
    "full shot",
    "panoramic",
    "background blur",
    // Lighting and atmosphere
    "natural light",
    "artificial light",
    "studio light",
    "flash photography",
    "soft light",
    "hard light",
    "low light",
    "sunrise",
    "sunset",
    "daylight",
    "nighttime",
    "sunny",
    "cloudy",
    "fog",
    "mist",
    "haze",
    "rain",
    "snow",
    // Colors and tones
    "black and white",
    "monochromatic",
    "vibrant colors",
    "muted colors",
    "pastel colors",
    "warm tones",
    "cool tones",
    "high contrast",
    "low contrast",
    "bright",
    "dark",
    "colorful",
    "desaturated",
    "HDR",
    // Subjects: people and life
    "person",
    "people",
    "child",
    "baby",
    "family",
    "couple",
    "friends",
    "self-portrait",
    "male portrait",
    "female portrait",
    "street performer",
    "crowd",
    "people walking",
    "people interacting",
    "smiling",
    "laughing",
    "action shot",
    "emotion",
    "happiness",
    "sadness",
    "contemplation",
    // Subjects: animals and wildlife
    "dog",
    "cat",
    "bird",
    "wildlife",
    "animal portrait",
    "animal in nature",
    "insect",
    "mammal",
    "reptile",
    "fish",
    "pet photography",
    "feathered",
    "furry",
    "scales",
    // Subjects: nature and landscapes
    "mountains",
    "forest",
    "trees",
    "flowers",
    "garden",
    "field",
    "grasslands",
    "beach",
    "ocean",
    "lake",
    "river",
    "waterfall",
    "desert",
    "sand dunes",
    "rocks",
    "path",
    "trail",
    "sky",
    "clouds",
    "stars",
    "moon",
    "sun",
    "autumn leaves",
    "spring blossoms",
    "cave",
    "valley",
    "canyon",
    "coastline",
    "waves",
    "plant",
    "fungi",
    "ice",
    "glacier",
    "volcano",
    "island",
    "rural landscape",
    "countryside",
    // Subjects: urban and architecture
    "cityscape",
    "urban scene",
    "buildings",
    "street",
    "road",
    "alleyway",
    "bridge",
    "architecture",
    "historical building",
    "modern building",
    "landmark",
    "monument",
    "statue",
    "house",
    "structure",
    "facade",
    "window",
    "door",
    "street art",
    "graffiti",
    "night city lights",
    "public square",
    "market",
    "temple",
    "church",
    "castle",
    "factory",
    "industrial area",
    "pier",
    "harbor",
    "skyline",
    "traffic",
    "neon lights",
    "subway",
    // Mood and aesthetic
    "peaceful",
    "calm",
    "dramatic",
    "moody",
    "joyful",
    "happy",
    "energetic",
    "emotional",
    "beautiful",
    "modern",
    "vintage",
    "love",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_tags_are_non_empty_phrases() {
        assert!(BASE_TAGS.len() > 100);
        assert!(BASE_TAGS.iter().all(|t| !t.trim().is_empty()));
    }
}
