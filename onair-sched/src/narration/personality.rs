//! Host personalities and templated intros
//!
//! The personality only varies tone; nothing downstream depends on which
//! one was picked.

use onair_common::db::ContentItem;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Energetic,
    Chill,
    Professional,
    Quirky,
}

impl Personality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Energetic => "energetic",
            Personality::Chill => "chill",
            Personality::Professional => "professional",
            Personality::Quirky => "quirky",
        }
    }

    /// Candidate tones for an hour of the day (0-23)
    pub fn bucket(hour: u32) -> [Personality; 2] {
        match hour {
            6..=9 => [Personality::Energetic, Personality::Professional],
            10..=15 => [Personality::Professional, Personality::Chill],
            16..=19 => [Personality::Energetic, Personality::Quirky],
            _ => [Personality::Chill, Personality::Quirky],
        }
    }

    /// Random pick within the hour's bucket
    pub fn for_hour<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> Personality {
        let bucket = Self::bucket(hour);
        *bucket.choose(rng).unwrap_or(&bucket[0])
    }

    fn style(&self) -> &'static str {
        match self {
            Personality::Energetic => "high-energy and enthusiastic",
            Personality::Chill => "laid-back and smooth",
            Personality::Professional => "articulate and informative",
            Personality::Quirky => "playful, with unexpected wordplay",
        }
    }

    fn greeting(&self) -> &'static str {
        match self {
            Personality::Energetic => "Hey there, music lovers!",
            Personality::Chill => "Welcome back, friends",
            Personality::Professional => "Good evening, and welcome",
            Personality::Quirky => "Greetings, humans and machines alike!",
        }
    }

    /// Deterministic intro used when the narration service fails
    pub fn fallback_intro(&self, item: &ContentItem) -> String {
        let title = non_empty(&item.title).unwrap_or("this track");
        let creator = non_empty(&item.creator).unwrap_or("one of our creators");

        match self {
            Personality::Energetic => {
                format!("Hey there! Here's something awesome: {} by {}. Let's dive in!", title, creator)
            }
            Personality::Chill => {
                format!("Here's a nice one for you. {} from {}. Sit back and enjoy.", title, creator)
            }
            Personality::Professional => {
                format!("Coming up now, we have {} created by {}.", title, creator)
            }
            Personality::Quirky => format!(
                "Beep boop! The station proudly presents {} by {}. Prepare for something different!",
                title, creator
            ),
        }
    }

    /// Prompt sent to the narration service
    pub fn intro_prompt(&self, item: &ContentItem) -> String {
        format!(
            "You are a radio host with a {style} personality on an always-on media station.\n\
             Write a brief spoken introduction (20 to 30 seconds) for this content:\n\n\
             Title: {title}\n\
             Creator: {creator}\n\
             Type: {kind}\n\
             Category: {category}\n\
             Description: {description}\n\n\
             Open with something like \"{greeting}\". Do not use quotation marks.\n\
             Respond with the introduction text only.",
            style = self.style(),
            title = non_empty(&item.title).unwrap_or("Untitled"),
            creator = non_empty(&item.creator).unwrap_or("Anonymous"),
            kind = item.media_kind.as_str(),
            category = item.category.as_deref().and_then(non_empty).unwrap_or("General"),
            description = item.description.as_deref().and_then(non_empty).unwrap_or("No description"),
            greeting = self.greeting(),
        )
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
