//! Core sheet types for santasheet.
//!
//! A sheet is one person's gift-preference record. The persisted shape is the
//! camelCase JSON object used by exports; list-valued preferences are stored
//! natively as ordered string lists.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Every editable field of a sheet, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// The name printed at the top of the sheet.
    DisplayName,
    /// The year the sheet applies to.
    Year,
    /// Favorite candy or snacks.
    FavoriteCandySnack,
    /// Favorite scents.
    FavoriteScents,
    /// Favorite fast food places.
    FavoriteFastFoodPlaces,
    /// Favorite restaurants.
    FavoriteRestaurants,
    /// Favorite stores to shop at.
    FavoriteStores,
    /// Cell phone model.
    CellPhoneModel,
    /// Favorite saying or quote.
    FavoriteSaying,
    /// Favorite sports team.
    FavoriteSportsTeam,
    /// Favorite colors or decor theme.
    FavoriteColorsTheme,
    /// Favorite logo or emblem.
    FavoriteLogoEmblem,
    /// Anniversary date.
    AnniversaryDate,
    /// Favorite places to go or things to do.
    FavoritePlaces,
    /// Clothing sizes.
    ClothingSizes,
    /// Other favorites, interests and hobbies.
    OtherFavorites,
    /// Pets, kids and partners.
    FamilyDetails,
    /// Top wishlist items.
    WishlistTopItems,
    /// Anything else worth knowing.
    AdditionalNotes,
}

/// How a field is edited and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form string.
    Text,
    /// Ordered list, edited as one entry per line.
    List,
    /// Integer year, edited as free text.
    Year,
}

impl Field {
    /// All fields in form order.
    pub const ALL: [Field; 19] = [
        Field::DisplayName,
        Field::Year,
        Field::FavoriteCandySnack,
        Field::FavoriteScents,
        Field::FavoriteFastFoodPlaces,
        Field::FavoriteRestaurants,
        Field::FavoriteStores,
        Field::CellPhoneModel,
        Field::FavoriteSaying,
        Field::FavoriteSportsTeam,
        Field::FavoriteColorsTheme,
        Field::FavoriteLogoEmblem,
        Field::AnniversaryDate,
        Field::FavoritePlaces,
        Field::ClothingSizes,
        Field::OtherFavorites,
        Field::FamilyDetails,
        Field::WishlistTopItems,
        Field::AdditionalNotes,
    ];

    /// The persisted JSON key.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::DisplayName => "displayName",
            Self::Year => "year",
            Self::FavoriteCandySnack => "favoriteCandySnack",
            Self::FavoriteScents => "favoriteScents",
            Self::FavoriteFastFoodPlaces => "favoriteFastFoodPlaces",
            Self::FavoriteRestaurants => "favoriteRestaurants",
            Self::FavoriteStores => "favoriteStores",
            Self::CellPhoneModel => "cellPhoneModel",
            Self::FavoriteSaying => "favoriteSaying",
            Self::FavoriteSportsTeam => "favoriteSportsTeam",
            Self::FavoriteColorsTheme => "favoriteColorsTheme",
            Self::FavoriteLogoEmblem => "favoriteLogoEmblem",
            Self::AnniversaryDate => "anniversaryDate",
            Self::FavoritePlaces => "favoritePlaces",
            Self::ClothingSizes => "clothingSizes",
            Self::OtherFavorites => "otherFavorites",
            Self::FamilyDetails => "familyDetails",
            Self::WishlistTopItems => "wishlistTopItems",
            Self::AdditionalNotes => "additionalNotes",
        }
    }

    /// The question printed next to the field.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DisplayName => "Name",
            Self::Year => "Year",
            Self::FavoriteCandySnack => "Favorite candy/snack",
            Self::FavoriteScents => "Favorite scents",
            Self::FavoriteFastFoodPlaces => "Favorite fast food places",
            Self::FavoriteRestaurants => "Favorite restaurants",
            Self::FavoriteStores => "Favorite stores to shop at",
            Self::CellPhoneModel => "What model cell phone do you have",
            Self::FavoriteSaying => "Favorite saying/quote",
            Self::FavoriteSportsTeam => "Favorite sports team",
            Self::FavoriteColorsTheme => "Favorite colors/decor theme",
            Self::FavoriteLogoEmblem => "Favorite logo/emblem",
            Self::AnniversaryDate => "What is your anniversary date",
            Self::FavoritePlaces => "Favorite places to go/do",
            Self::ClothingSizes => "Sizes tops/bottoms",
            Self::OtherFavorites => "Any other favorites/interests/hobbies",
            Self::FamilyDetails => "Any pets/kids/grandkids/bf/gf/spouse & their names",
            Self::WishlistTopItems => {
                "Any other things not mentioned/or you want/ top things on xmas list"
            }
            Self::AdditionalNotes => "Anything else you feel santa should know",
        }
    }

    /// How this field is edited and stored.
    #[must_use]
    pub fn kind(self) -> FieldKind {
        match self {
            Self::Year => FieldKind::Year,
            Self::FavoriteCandySnack
            | Self::FavoriteScents
            | Self::FavoriteFastFoodPlaces
            | Self::FavoriteRestaurants
            | Self::FavoriteStores
            | Self::FavoritePlaces
            | Self::WishlistTopItems => FieldKind::List,
            _ => FieldKind::Text,
        }
    }

    /// Check if this field holds a list.
    #[must_use]
    pub fn is_list(self) -> bool {
        self.kind() == FieldKind::List
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|field| field.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownField {
                name: s.to_string(),
            })
    }
}

/// Deserialize a value that may be `null`, using the type's default for `null`.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Deserialize a list whose entries may be `null`; `null` entries are dropped.
fn nullable_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(entries.into_iter().flatten().flatten().collect())
}

/// The writable content of a sheet: everything except the store-owned
/// `id` and `updatedAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetFields {
    /// Name printed at the top of the sheet.
    #[serde(default, deserialize_with = "nullable")]
    pub display_name: String,
    /// Year the sheet applies to.
    #[serde(default)]
    pub year: Option<i32>,
    /// Favorite candy or snacks.
    #[serde(default, deserialize_with = "nullable_list")]
    pub favorite_candy_snack: Vec<String>,
    /// Favorite scents.
    #[serde(default, deserialize_with = "nullable_list")]
    pub favorite_scents: Vec<String>,
    /// Favorite fast food places.
    #[serde(default, deserialize_with = "nullable_list")]
    pub favorite_fast_food_places: Vec<String>,
    /// Favorite restaurants.
    #[serde(default, deserialize_with = "nullable_list")]
    pub favorite_restaurants: Vec<String>,
    /// Favorite stores to shop at.
    #[serde(default, deserialize_with = "nullable_list")]
    pub favorite_stores: Vec<String>,
    /// Cell phone model.
    #[serde(default, deserialize_with = "nullable")]
    pub cell_phone_model: String,
    /// Favorite saying or quote.
    #[serde(default, deserialize_with = "nullable")]
    pub favorite_saying: String,
    /// Favorite sports team.
    #[serde(default, deserialize_with = "nullable")]
    pub favorite_sports_team: String,
    /// Favorite colors or decor theme.
    #[serde(default, deserialize_with = "nullable")]
    pub favorite_colors_theme: String,
    /// Favorite logo or emblem.
    #[serde(default, deserialize_with = "nullable")]
    pub favorite_logo_emblem: String,
    /// Anniversary date, free-form.
    #[serde(default, deserialize_with = "nullable")]
    pub anniversary_date: String,
    /// Favorite places to go or things to do.
    #[serde(default, deserialize_with = "nullable_list")]
    pub favorite_places: Vec<String>,
    /// Clothing sizes for tops and bottoms.
    #[serde(default, deserialize_with = "nullable")]
    pub clothing_sizes: String,
    /// Other favorites, interests and hobbies.
    #[serde(default, deserialize_with = "nullable")]
    pub other_favorites: String,
    /// Pets, kids, partners and their names.
    #[serde(default, deserialize_with = "nullable")]
    pub family_details: String,
    /// Top wishlist items.
    #[serde(default, deserialize_with = "nullable_list")]
    pub wishlist_top_items: Vec<String>,
    /// Anything else worth knowing.
    #[serde(default, deserialize_with = "nullable")]
    pub additional_notes: String,
}

impl SheetFields {
    /// Fields for a freshly created sheet.
    #[must_use]
    pub fn seeded(display_name: impl Into<String>, year: i32) -> Self {
        Self {
            display_name: display_name.into(),
            year: Some(year),
            ..Self::default()
        }
    }

    /// The list stored under `field`, or `None` if `field` is not a list field.
    #[must_use]
    pub fn list(&self, field: Field) -> Option<&[String]> {
        let list = match field {
            Field::FavoriteCandySnack => &self.favorite_candy_snack,
            Field::FavoriteScents => &self.favorite_scents,
            Field::FavoriteFastFoodPlaces => &self.favorite_fast_food_places,
            Field::FavoriteRestaurants => &self.favorite_restaurants,
            Field::FavoriteStores => &self.favorite_stores,
            Field::FavoritePlaces => &self.favorite_places,
            Field::WishlistTopItems => &self.wishlist_top_items,
            _ => return None,
        };
        Some(list)
    }

    /// Mutable access to the list stored under `field`.
    pub fn list_mut(&mut self, field: Field) -> Option<&mut Vec<String>> {
        let list = match field {
            Field::FavoriteCandySnack => &mut self.favorite_candy_snack,
            Field::FavoriteScents => &mut self.favorite_scents,
            Field::FavoriteFastFoodPlaces => &mut self.favorite_fast_food_places,
            Field::FavoriteRestaurants => &mut self.favorite_restaurants,
            Field::FavoriteStores => &mut self.favorite_stores,
            Field::FavoritePlaces => &mut self.favorite_places,
            Field::WishlistTopItems => &mut self.wishlist_top_items,
            _ => return None,
        };
        Some(list)
    }

    /// The text stored under `field`, or `None` if `field` is not a text field.
    #[must_use]
    pub fn text(&self, field: Field) -> Option<&str> {
        let text = match field {
            Field::DisplayName => &self.display_name,
            Field::CellPhoneModel => &self.cell_phone_model,
            Field::FavoriteSaying => &self.favorite_saying,
            Field::FavoriteSportsTeam => &self.favorite_sports_team,
            Field::FavoriteColorsTheme => &self.favorite_colors_theme,
            Field::FavoriteLogoEmblem => &self.favorite_logo_emblem,
            Field::AnniversaryDate => &self.anniversary_date,
            Field::ClothingSizes => &self.clothing_sizes,
            Field::OtherFavorites => &self.other_favorites,
            Field::FamilyDetails => &self.family_details,
            Field::AdditionalNotes => &self.additional_notes,
            _ => return None,
        };
        Some(text)
    }

    /// Mutable access to the text stored under `field`.
    pub fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        let text = match field {
            Field::DisplayName => &mut self.display_name,
            Field::CellPhoneModel => &mut self.cell_phone_model,
            Field::FavoriteSaying => &mut self.favorite_saying,
            Field::FavoriteSportsTeam => &mut self.favorite_sports_team,
            Field::FavoriteColorsTheme => &mut self.favorite_colors_theme,
            Field::FavoriteLogoEmblem => &mut self.favorite_logo_emblem,
            Field::AnniversaryDate => &mut self.anniversary_date,
            Field::ClothingSizes => &mut self.clothing_sizes,
            Field::OtherFavorites => &mut self.other_favorites,
            Field::FamilyDetails => &mut self.family_details,
            Field::AdditionalNotes => &mut self.additional_notes,
            _ => return None,
        };
        Some(text)
    }
}

/// A stored sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRecord {
    /// Unique identifier, assigned on creation and never reused.
    pub id: String,

    /// The sheet's content.
    #[serde(flatten)]
    pub fields: SheetFields,

    /// Last write time, maintained by the store.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SheetRecord {
    /// The display name, or `fallback` when the sheet has none.
    #[must_use]
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.fields.display_name.is_empty() {
            fallback
        } else {
            &self.fields.display_name
        }
    }
}

/// A request to create a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSheet {
    /// Identifier to preserve; the store assigns one when `None`.
    pub id: Option<String>,
    /// The sheet's content.
    pub fields: SheetFields,
}

impl NewSheet {
    /// A create request with a store-assigned id.
    #[must_use]
    pub fn new(fields: SheetFields) -> Self {
        Self { id: None, fields }
    }

    /// A create request that keeps the given id.
    #[must_use]
    pub fn with_id(id: impl Into<String>, fields: SheetFields) -> Self {
        Self {
            id: Some(id.into()),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_keys_are_unique() {
        let mut keys: Vec<_> = Field::ALL.iter().map(|f| f.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Field::ALL.len());
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("wishlistTopItems".parse::<Field>().unwrap(), Field::WishlistTopItems);
        assert_eq!("DISPLAYNAME".parse::<Field>().unwrap(), Field::DisplayName);
        assert!("shoeSize".parse::<Field>().is_err());
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(Field::Year.kind(), FieldKind::Year);
        assert!(Field::FavoriteScents.is_list());
        assert!(!Field::ClothingSizes.is_list());
        assert_eq!(Field::ALL.iter().filter(|f| f.is_list()).count(), 7);
    }

    #[test]
    fn test_every_field_has_exactly_one_accessor() {
        let mut fields = SheetFields::default();
        for field in Field::ALL {
            let has_list = fields.list(field).is_some();
            let has_text = fields.text(field).is_some();
            assert_eq!(has_list, field.kind() == FieldKind::List, "{field}");
            assert_eq!(has_text, field.kind() == FieldKind::Text, "{field}");
            assert_eq!(fields.list_mut(field).is_some(), has_list);
            assert_eq!(fields.text_mut(field).is_some(), has_text);
        }
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = SheetRecord {
            id: "sheet-1".to_string(),
            fields: SheetFields {
                favorite_scents: vec!["Pine".to_string()],
                ..SheetFields::seeded("Ada Lovelace", 2024)
            },
            updated_at: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "sheet-1");
        assert_eq!(json["displayName"], "Ada Lovelace");
        assert_eq!(json["year"], 2024);
        assert_eq!(json["favoriteScents"][0], "Pine");
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_fields_tolerate_nulls_and_missing_keys() {
        let json = r#"{
            "displayName": null,
            "favoriteCandySnack": ["Fudge", null, "Taffy"],
            "favoriteScents": null,
            "owner": "ignored"
        }"#;
        let fields: SheetFields = serde_json::from_str(json).unwrap();

        assert_eq!(fields.display_name, "");
        assert_eq!(fields.favorite_candy_snack, vec!["Fudge", "Taffy"]);
        assert!(fields.favorite_scents.is_empty());
        assert_eq!(fields.year, None);
    }

    #[test]
    fn test_name_or() {
        let mut record = SheetRecord {
            id: "x".to_string(),
            fields: SheetFields::default(),
            updated_at: None,
        };
        assert_eq!(record.name_or("Unknown"), "Unknown");
        record.fields.display_name = "Bob".to_string();
        assert_eq!(record.name_or("Unknown"), "Bob");
    }
}
