//! Closed option vocabularies for the questionnaire.
//!
//! These are the fixed button sets offered at each collection step. They are
//! product copy, not configuration: the downstream extraction service and the
//! CRM quiz profile both key on these exact labels.

/// Overall budget ranges (single choice).
pub const BUDGET_OPTIONS: &[&str] = &[
    "< $15,000",
    "$15,000 - $20,000",
    "$20,000 - $30,000",
    "$30,000 - $40,000",
    "$40,000 - $50,000",
    "$50,000 - $75,000",
    "$75,000 - $100,000",
    "$100,000+",
];

/// Venue settings (pick top 3).
pub const SETTING_OPTIONS: &[&str] = &[
    "Ballroom",
    "Barn",
    "Beach House",
    "Castle",
    "Chalet",
    "Courthouse",
    "Country Club",
    "Estate",
    "Greenhouse",
    "Historic Building",
    "Hotel",
    "Industrial Space",
    "Lodge",
    "Mansion",
    "Museum",
    "Open Space",
    "Pavilion",
    "Restaurant",
    "Rooftop",
    "Ship/Boat",
    "Tent",
    "Terrace",
    "Vineyard",
];

/// Venue styles (pick top 3).
pub const STYLE_OPTIONS: &[&str] = &[
    "Artistic",
    "Boho",
    "Casual",
    "Chic",
    "Classic",
    "Cozy",
    "Eclectic",
    "Elegant",
    "Glamorous",
    "Grand",
    "Industrial",
    "Luxury",
    "Minimalist",
    "Modern",
    "Playful",
    "Romantic",
    "Rustic",
    "Traditional",
    "Vintage",
    "Whimsical",
];

/// Surrounding scenery (pick top 3).
pub const SCENERY_OPTIONS: &[&str] = &[
    "Beach",
    "Cityscape",
    "Cliffside",
    "Countryside",
    "Desert",
    "Fields",
    "Forest",
    "Garden",
    "Lakeside",
    "Marsh",
    "Meadow",
    "Mountain",
    "Park",
    "Rolling Hills",
    "Tropics",
    "Urban",
    "Valley",
    "Vineyard",
    "Waterfall",
    "Waterfront",
];

/// Celebration types (single choice).
pub const CELEBRATION_OPTIONS: &[&str] = &[
    "Full Wedding (Ceremony + Reception)",
    "Full Wedding Weekend / Multi-Day",
    "Ceremony Only",
    "Reception Only",
    "Elopement",
    "Micro-Wedding",
    "Rehearsal Dinner",
    "Vow Renewal",
    "Engagement Party",
];

/// Required spaces (select all that apply).
pub const SPACES_OPTIONS: &[&str] = &[
    "Bridal Suite",
    "Groom Suite",
    "Indoor Ceremony Space",
    "Outdoor Ceremony Space",
    "Indoor Reception Space",
    "Outdoor Reception Space",
    "On-site Accommodations",
];

/// Pet policy (yes/no).
pub const PET_OPTIONS: &[&str] = &["Yes, we need pet-friendly", "No pets"];

/// Accessibility requirement (yes/no).
pub const ACCESSIBILITY_OPTIONS: &[&str] =
    &["Yes, wheelchair accessibility needed", "No, not needed"];

/// Vendor handling preference (single choice).
pub const VENDOR_OPTIONS: &[&str] = &[
    "All-Inclusive: venue provides food & drinks",
    "Flexible: I want to pick my own caterer",
    "DIY: blank canvas, bring everything myself",
];

/// Day-of coordination requirement (yes/no).
pub const COORDINATION_OPTIONS: &[&str] =
    &["Yes, coordination included", "No, I have my own planner"];

/// Quick reply offered with the date question.
pub const DATE_UNSURE_REPLY: &str = "Not sure yet";
