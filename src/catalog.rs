// Room catalog and hotel identity
// Read-only reference data shared by every step of the booking flow

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("Duplicate room id: {0}")]
    DuplicateId(String),

    #[error("Room {0} must have a positive nightly price")]
    InvalidPrice(String),

    #[error("Room {0} must sleep at least one guest")]
    InvalidCapacity(String),
}

// Property-wide details shown on every page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HotelInfo {
    pub name: &'static str,
    pub location: &'static str,
    pub tagline: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub currency: &'static str,
}

pub const HOTEL: HotelInfo = HotelInfo {
    name: "The Royal Chettinad",
    location: "Tamil Nadu, India",
    tagline: "Heritage Luxury in the Heart of Tamil Nadu",
    address: "12 Heritage Road, Karaikudi, Tamil Nadu 630001",
    phone: "+91 4565 223344",
    email: "reservations@royalchettinad.com",
    currency: "OMR",
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOffering {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub description: String,
    pub price_per_night: u32,
    pub capacity: u8,
    pub amenities: Vec<String>,
}

impl RoomOffering {
    pub fn new(
        id: &str,
        name: &str,
        room_type: &str,
        description: &str,
        price_per_night: u32,
        capacity: u8,
        amenities: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            room_type: room_type.to_string(),
            description: description.to_string(),
            price_per_night,
            capacity,
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
        }
    }

    // The short amenity list shown on the selected-room card
    pub fn highlights(&self) -> &[String] {
        &self.amenities[..self.amenities.len().min(3)]
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    rooms: Vec<RoomOffering>,
}

impl Catalog {
    pub fn new(rooms: Vec<RoomOffering>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for room in &rooms {
            if !seen.insert(room.id.as_str()) {
                return Err(CatalogError::DuplicateId(room.id.clone()));
            }
            if room.price_per_night == 0 {
                return Err(CatalogError::InvalidPrice(room.id.clone()));
            }
            if room.capacity == 0 {
                return Err(CatalogError::InvalidCapacity(room.id.clone()));
            }
        }

        Ok(Self { rooms })
    }

    // The hotel's own offerings, built on first use and shared for the life of the process
    pub fn builtin() -> &'static Catalog {
        static BUILTIN: OnceLock<Catalog> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            Catalog::new(builtin_rooms()).expect("built-in room table violates catalog rules")
        })
    }

    pub fn rooms(&self) -> &[RoomOffering] {
        &self.rooms
    }

    pub fn find(&self, id: &str) -> Option<&RoomOffering> {
        self.rooms.iter().find(|room| room.id == id)
    }
}

fn builtin_rooms() -> Vec<RoomOffering> {
    vec![
        RoomOffering::new(
            "standard",
            "Heritage Classic",
            "Standard",
            "A cozy retreat featuring traditional wooden accents and modern amenities.",
            35,
            2,
            &["King Bed", "City View", "Free Wi-Fi", "Rain Shower"],
        ),
        RoomOffering::new(
            "deluxe",
            "Temple View Deluxe",
            "Deluxe",
            "Spacious luxury with breathtaking views of the historic temples.",
            55,
            3,
            &["King Bed", "Balcony", "Temple View", "Bathtub", "Mini Bar"],
        ),
        RoomOffering::new(
            "premium",
            "Royal Maharaja Suite",
            "Premium",
            "The epitome of luxury living with a separate living area and royal decor.",
            95,
            4,
            &[
                "King Bed",
                "Living Room",
                "Panoramic View",
                "Jacuzzi",
                "Butler Service",
            ],
        ),
    ]
}
