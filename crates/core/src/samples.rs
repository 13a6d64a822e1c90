/// Short stories to try the service with, one per dominant mood.
pub const SAMPLE_STORIES: [&str; 4] = [
    "The sunlight spilled through her open window.\nShe spun in circles, arms wide, laughing at the sky.\nA breeze swept in, carrying the scent of jasmine.\nIt felt like the whole world was dancing with her.",
    "The letter was yellowed and folded with care.\nHe read the words again, lips silently moving.\nTears blurred the ink as memories flooded in.\nHe held it close, as if it were her hand.",
    "The power cut out, and silence fell.\nFootsteps echoed from upstairs — but no one lived there.\nHer breath caught as the doorknob began to turn.\nShe wasn't alone in the house anymore.",
    "The vase shattered as it hit the floor.\nHe stormed out, the sound of his footsteps sharp and final.\nShe stood frozen, fists clenched at her sides.\nNo words could mend what rage had torn open.",
];

/// 1-based lookup, matching how samples are numbered for users.
pub fn sample(number: usize) -> Option<&'static str> {
    number
        .checked_sub(1)
        .and_then(|i| SAMPLE_STORIES.get(i))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_one_based() {
        assert_eq!(sample(0), None);
        assert!(sample(1).unwrap().starts_with("The sunlight"));
        assert!(sample(4).unwrap().starts_with("The vase"));
        assert_eq!(sample(5), None);
    }
}
