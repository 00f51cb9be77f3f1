//! Board representation.
//!
//! The board is 40 fixed tiles. Purchasable tiles point into a separate
//! property table so ownership and building state can be addressed by a
//! stable property index, independent of board position.

use serde::{Deserialize, Serialize};

/// Player identifier. Stable for the whole game, never reused.
pub type PlayerId = u8;

/// Index into the property table (0..28 on the standard board).
pub type PropertyId = usize;

/// Index into the street table (0..22 on the standard board).
pub type StreetId = usize;

/// Cash amounts. Signed: rent and taxes can push a balance below zero.
pub type Money = i64;

pub const BOARD_SIZE: usize = 40;
pub const GO_POSITION: usize = 0;
pub const JAIL_POSITION: usize = 10;
pub const GO_TO_JAIL_POSITION: usize = 30;

const RAILROAD_RENTS: [Money; 4] = [25, 50, 100, 200];
const UTILITY_MULTIPLIERS: [Money; 2] = [4, 10];

/// Street color groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColorSet {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
}

impl ColorSet {
    pub const ALL: [ColorSet; 8] = [
        ColorSet::Brown,
        ColorSet::LightBlue,
        ColorSet::Pink,
        ColorSet::Orange,
        ColorSet::Red,
        ColorSet::Yellow,
        ColorSet::Green,
        ColorSet::DarkBlue,
    ];

    /// Price of one house on a street of this color.
    pub fn house_cost(&self) -> Money {
        match self {
            ColorSet::Brown | ColorSet::LightBlue => 50,
            ColorSet::Pink | ColorSet::Orange => 100,
            ColorSet::Red | ColorSet::Yellow => 150,
            ColorSet::Green | ColorSet::DarkBlue => 200,
        }
    }

    /// Price of a hotel. Same as a house; the four houses go back to the bank.
    pub fn hotel_cost(&self) -> Money {
        self.house_cost()
    }

    pub fn unit_cost(&self, building: BuildingType) -> Money {
        match building {
            BuildingType::House => self.house_cost(),
            BuildingType::Hotel => self.hotel_cost(),
        }
    }
}

/// Kind of building unit held by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingType {
    House,
    Hotel,
}

/// Grouping used for count-owned rent and set checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyGroup {
    Color(ColorSet),
    Railroad,
    Utility,
}

/// What kind of property a tile is, with its kind-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Street {
        color: ColorSet,
        street: StreetId,
        /// Base, full set, 1-4 houses, hotel.
        rents: [Money; 7],
        houses: u8,
        hotels: u8,
    },
    Railroad,
    Utility,
}

impl PropertyKind {
    pub fn group(&self) -> PropertyGroup {
        match self {
            PropertyKind::Street { color, .. } => PropertyGroup::Color(*color),
            PropertyKind::Railroad => PropertyGroup::Railroad,
            PropertyKind::Utility => PropertyGroup::Utility,
        }
    }

    /// Rent owed on an unmortgaged property.
    ///
    /// `owned_in_group` is how many properties of this group the owner holds,
    /// `full_set` whether that is the whole group.
    pub fn rent(&self, owned_in_group: usize, full_set: bool, dice_total: u32) -> Money {
        match self {
            PropertyKind::Street {
                rents,
                houses,
                hotels,
                ..
            } => {
                if *hotels > 0 {
                    rents[6]
                } else if *houses > 0 {
                    rents[1 + (*houses).min(4) as usize]
                } else if full_set {
                    rents[1]
                } else {
                    rents[0]
                }
            }
            PropertyKind::Railroad => {
                RAILROAD_RENTS[owned_in_group.clamp(1, RAILROAD_RENTS.len()) - 1]
            }
            PropertyKind::Utility => {
                UTILITY_MULTIPLIERS[owned_in_group.clamp(1, UTILITY_MULTIPLIERS.len()) - 1]
                    * dice_total as Money
            }
        }
    }
}

/// A purchasable tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub position: usize,
    pub name: String,
    pub price: Money,
    pub mortgage_value: Money,
    /// Mortgage value plus 10% interest, rounded up.
    pub unmortgage_price: Money,
    pub owner: Option<PlayerId>,
    pub mortgaged: bool,
    pub kind: PropertyKind,
}

impl Property {
    fn new(id: PropertyId, position: usize, name: &str, price: Money, kind: PropertyKind) -> Self {
        let mortgage_value = price / 2;
        Self {
            id,
            position,
            name: name.to_string(),
            price,
            mortgage_value,
            unmortgage_price: (mortgage_value * 11 + 9) / 10,
            owner: None,
            mortgaged: false,
            kind,
        }
    }

    pub fn street_id(&self) -> Option<StreetId> {
        match self.kind {
            PropertyKind::Street { street, .. } => Some(street),
            _ => None,
        }
    }

    pub fn color(&self) -> Option<ColorSet> {
        match self.kind {
            PropertyKind::Street { color, .. } => Some(color),
            _ => None,
        }
    }

    pub fn houses(&self) -> u8 {
        match self.kind {
            PropertyKind::Street { houses, .. } => houses,
            _ => 0,
        }
    }

    pub fn hotels(&self) -> u8 {
        match self.kind {
            PropertyKind::Street { hotels, .. } => hotels,
            _ => 0,
        }
    }

    /// Houses, or 5 for a hotel. Used by the even-build rule.
    pub fn building_level(&self) -> u8 {
        if self.hotels() > 0 {
            5
        } else {
            self.houses()
        }
    }

    pub fn has_buildings(&self) -> bool {
        self.building_level() > 0
    }

    /// Overwrite the building counts on a street. No-op on other kinds.
    pub(crate) fn set_buildings(&mut self, new_houses: u8, new_hotels: u8) {
        if let PropertyKind::Street { houses, hotels, .. } = &mut self.kind {
            *houses = new_houses;
            *hotels = new_hotels;
        }
    }
}

/// One of the 40 board squares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    Go,
    Property(PropertyId),
    Tax { name: String, amount: Money },
    Chance,
    CommunityChest,
    /// Just visiting, or held in jail.
    Jail,
    FreeParking,
    GoToJail,
}

/// The game board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub tiles: Vec<Tile>,
    pub properties: Vec<Property>,
    /// Street index to property index.
    streets: Vec<PropertyId>,
}

impl Board {
    fn empty() -> Self {
        Self {
            tiles: Vec::with_capacity(BOARD_SIZE),
            properties: Vec::new(),
            streets: Vec::new(),
        }
    }

    /// The standard 40-tile board
    pub fn standard() -> Self {
        use ColorSet::*;

        let mut board = Self::empty();
        board.tiles.push(Tile::Go);
        board.add_street("Mediterranean Avenue", Brown, 60, [2, 4, 10, 30, 90, 160, 250]);
        board.tiles.push(Tile::CommunityChest);
        board.add_street("Baltic Avenue", Brown, 60, [4, 8, 20, 60, 180, 320, 450]);
        board.add_tax("Income Tax", 200);
        board.add_railroad("Reading Railroad");
        board.add_street("Oriental Avenue", LightBlue, 100, [6, 12, 30, 90, 270, 400, 550]);
        board.tiles.push(Tile::Chance);
        board.add_street("Vermont Avenue", LightBlue, 100, [6, 12, 30, 90, 270, 400, 550]);
        board.add_street("Connecticut Avenue", LightBlue, 120, [8, 16, 40, 100, 300, 450, 600]);

        board.tiles.push(Tile::Jail);
        board.add_street("St. Charles Place", Pink, 140, [10, 20, 50, 150, 450, 625, 750]);
        board.add_utility("Electric Company");
        board.add_street("States Avenue", Pink, 140, [10, 20, 50, 150, 450, 625, 750]);
        board.add_street("Virginia Avenue", Pink, 160, [12, 24, 60, 180, 500, 700, 900]);
        board.add_railroad("Pennsylvania Railroad");
        board.add_street("St. James Place", Orange, 180, [14, 28, 70, 200, 550, 750, 950]);
        board.tiles.push(Tile::CommunityChest);
        board.add_street("Tennessee Avenue", Orange, 180, [14, 28, 70, 200, 550, 750, 950]);
        board.add_street("New York Avenue", Orange, 200, [16, 32, 80, 220, 600, 800, 1000]);

        board.tiles.push(Tile::FreeParking);
        board.add_street("Kentucky Avenue", Red, 220, [18, 36, 90, 250, 700, 875, 1050]);
        board.tiles.push(Tile::Chance);
        board.add_street("Indiana Avenue", Red, 220, [18, 36, 90, 250, 700, 875, 1050]);
        board.add_street("Illinois Avenue", Red, 240, [20, 40, 100, 300, 750, 925, 1100]);
        board.add_railroad("B. & O. Railroad");
        board.add_street("Atlantic Avenue", Yellow, 260, [22, 44, 110, 330, 800, 975, 1150]);
        board.add_street("Ventnor Avenue", Yellow, 260, [22, 44, 110, 330, 800, 975, 1150]);
        board.add_utility("Water Works");
        board.add_street("Marvin Gardens", Yellow, 280, [24, 48, 120, 360, 850, 1025, 1200]);

        board.tiles.push(Tile::GoToJail);
        board.add_street("Pacific Avenue", Green, 300, [26, 52, 130, 390, 900, 1100, 1275]);
        board.add_street("North Carolina Avenue", Green, 300, [26, 52, 130, 390, 900, 1100, 1275]);
        board.tiles.push(Tile::CommunityChest);
        board.add_street("Pennsylvania Avenue", Green, 320, [28, 56, 150, 450, 1000, 1200, 1400]);
        board.add_railroad("Short Line");
        board.tiles.push(Tile::Chance);
        board.add_street("Park Place", DarkBlue, 350, [35, 70, 175, 500, 1100, 1300, 1500]);
        board.add_tax("Luxury Tax", 100);
        board.add_street("Boardwalk", DarkBlue, 400, [50, 100, 200, 600, 1400, 1700, 2000]);

        debug_assert_eq!(board.tiles.len(), BOARD_SIZE);
        board
    }

    fn add_property(&mut self, name: &str, price: Money, kind: PropertyKind) {
        let id = self.properties.len();
        let position = self.tiles.len();
        self.properties
            .push(Property::new(id, position, name, price, kind));
        self.tiles.push(Tile::Property(id));
    }

    fn add_street(&mut self, name: &str, color: ColorSet, price: Money, rents: [Money; 7]) {
        let street = self.streets.len();
        self.streets.push(self.properties.len());
        self.add_property(
            name,
            price,
            PropertyKind::Street {
                color,
                street,
                rents,
                houses: 0,
                hotels: 0,
            },
        );
    }

    fn add_railroad(&mut self, name: &str) {
        self.add_property(name, 200, PropertyKind::Railroad);
    }

    fn add_utility(&mut self, name: &str) {
        self.add_property(name, 150, PropertyKind::Utility);
    }

    fn add_tax(&mut self, name: &str, amount: Money) {
        self.tiles.push(Tile::Tax {
            name: name.to_string(),
            amount,
        });
    }

    // ==================== Lookups ====================

    pub fn tile(&self, position: usize) -> &Tile {
        &self.tiles[position % self.tiles.len()]
    }

    pub fn tile_name(&self, position: usize) -> String {
        match self.tile(position) {
            Tile::Go => "GO".into(),
            Tile::Property(id) => self.properties[*id].name.clone(),
            Tile::Tax { name, .. } => name.clone(),
            Tile::Chance => "Chance".into(),
            Tile::CommunityChest => "Community Chest".into(),
            Tile::Jail => "Jail".into(),
            Tile::FreeParking => "Free Parking".into(),
            Tile::GoToJail => "Go To Jail".into(),
        }
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id)
    }

    pub(crate) fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.properties.get_mut(id)
    }

    /// Property index of the tile at a board position, if purchasable.
    pub fn property_at(&self, position: usize) -> Option<PropertyId> {
        match self.tile(position) {
            Tile::Property(id) => Some(*id),
            _ => None,
        }
    }

    /// Property index of a street index.
    pub fn street(&self, street: StreetId) -> Option<PropertyId> {
        self.streets.get(street).copied()
    }

    pub fn street_count(&self) -> usize {
        self.streets.len()
    }

    /// Property indices of every member of a group, in board order.
    pub fn group_members(&self, group: PropertyGroup) -> Vec<PropertyId> {
        self.properties
            .iter()
            .filter(|p| p.kind.group() == group)
            .map(|p| p.id)
            .collect()
    }

    pub fn count_owned(&self, player: PlayerId, group: PropertyGroup) -> usize {
        self.properties
            .iter()
            .filter(|p| p.kind.group() == group && p.owner == Some(player))
            .count()
    }

    pub fn owns_full_set(&self, player: PlayerId, color: ColorSet) -> bool {
        self.properties
            .iter()
            .filter(|p| p.color() == Some(color))
            .all(|p| p.owner == Some(player))
    }

    /// Full set owned with no member mortgaged. Required for building.
    pub fn owns_buildable_set(&self, player: PlayerId, color: ColorSet) -> bool {
        self.properties
            .iter()
            .filter(|p| p.color() == Some(color))
            .all(|p| p.owner == Some(player) && !p.mortgaged)
    }

    /// Rent due for landing on a property. Zero when unowned or mortgaged.
    pub fn rent(&self, id: PropertyId, dice_total: u32) -> Money {
        let Some(property) = self.property(id) else {
            return 0;
        };
        let Some(owner) = property.owner else {
            return 0;
        };
        if property.mortgaged {
            return 0;
        }
        let group = property.kind.group();
        let owned = self.count_owned(owner, group);
        let full_set = match group {
            PropertyGroup::Color(color) => self.owns_full_set(owner, color),
            _ => owned == self.group_members(group).len(),
        };
        property.kind.rent(owned, full_set, dice_total)
    }

    /// Houses standing on the board.
    pub fn houses_on_board(&self) -> u32 {
        self.properties.iter().map(|p| p.houses() as u32).sum()
    }

    /// Hotels standing on the board.
    pub fn hotels_on_board(&self) -> u32 {
        self.properties.iter().map(|p| p.hotels() as u32).sum()
    }

    /// (houses, hotels) owned by one player.
    pub fn buildings_owned_by(&self, player: PlayerId) -> (u32, u32) {
        self.properties
            .iter()
            .filter(|p| p.owner == Some(player))
            .fold((0, 0), |(h, t), p| (h + p.houses() as u32, t + p.hotels() as u32))
    }

    /// First position strictly after `from` holding a property of `group`.
    pub fn nearest(&self, from: usize, group: PropertyGroup) -> Option<usize> {
        (1..=self.tiles.len())
            .map(|step| (from + step) % self.tiles.len())
            .find(|&pos| {
                self.property_at(pos)
                    .map(|id| self.properties[id].kind.group() == group)
                    .unwrap_or(false)
            })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_board_shape() {
        let board = Board::standard();
        assert_eq!(board.tiles.len(), 40);
        assert_eq!(board.properties.len(), 28);
        assert_eq!(board.street_count(), 22);
        assert_eq!(board.tile(JAIL_POSITION), &Tile::Jail);
        assert_eq!(board.tile(GO_TO_JAIL_POSITION), &Tile::GoToJail);
    }

    #[test]
    fn test_property_and_street_indices_follow_board_order() {
        let board = Board::standard();
        assert_eq!(board.property_at(1), Some(0));
        assert_eq!(board.property_at(39), Some(27));
        assert_eq!(board.street(0), Some(0));
        // Reading Railroad is property 2, so Oriental is street 2 but property 3
        assert_eq!(board.street(2), Some(3));
        assert_eq!(board.properties[board.street(21).unwrap()].name, "Boardwalk");
    }

    #[test]
    fn test_mortgage_prices() {
        let board = Board::standard();
        let boardwalk = board.property(27).unwrap();
        assert_eq!(boardwalk.mortgage_value, 200);
        assert_eq!(boardwalk.unmortgage_price, 220);
        let park_place = board.property(26).unwrap();
        assert_eq!(park_place.unmortgage_price, 193);
        let electric = board.property(board.property_at(12).unwrap()).unwrap();
        assert_eq!(electric.unmortgage_price, 83);
    }

    #[test]
    fn test_street_rent_levels() {
        let mut board = Board::standard();
        board.properties[0].owner = Some(0);
        assert_eq!(board.rent(0, 7), 2);

        board.properties[1].owner = Some(0);
        assert_eq!(board.rent(0, 7), 4);

        board.properties[0].set_buildings(3, 0);
        assert_eq!(board.rent(0, 7), 90);

        board.properties[0].set_buildings(0, 1);
        assert_eq!(board.rent(0, 7), 250);

        board.properties[0].mortgaged = true;
        assert_eq!(board.rent(0, 7), 0);
    }

    #[test]
    fn test_railroad_and_utility_rent() {
        let mut board = Board::standard();
        let reading = board.property_at(5).unwrap();
        let short_line = board.property_at(35).unwrap();
        let electric = board.property_at(12).unwrap();
        let water = board.property_at(28).unwrap();

        board.properties[reading].owner = Some(1);
        assert_eq!(board.rent(reading, 0), 25);
        board.properties[short_line].owner = Some(1);
        assert_eq!(board.rent(reading, 0), 50);

        board.properties[electric].owner = Some(2);
        assert_eq!(board.rent(electric, 9), 36);
        board.properties[water].owner = Some(2);
        assert_eq!(board.rent(electric, 9), 90);
    }

    #[test]
    fn test_nearest_wraps_around() {
        let board = Board::standard();
        assert_eq!(board.nearest(7, PropertyGroup::Railroad), Some(15));
        assert_eq!(board.nearest(36, PropertyGroup::Railroad), Some(5));
        assert_eq!(board.nearest(36, PropertyGroup::Utility), Some(12));
        assert_eq!(board.nearest(22, PropertyGroup::Utility), Some(28));
    }

    #[test]
    fn test_full_set_detection() {
        let mut board = Board::standard();
        for id in board.group_members(PropertyGroup::Color(ColorSet::LightBlue)) {
            board.properties[id].owner = Some(3);
        }
        assert!(board.owns_full_set(3, ColorSet::LightBlue));
        assert!(board.owns_buildable_set(3, ColorSet::LightBlue));
        board.properties[3].mortgaged = true;
        assert!(!board.owns_buildable_set(3, ColorSet::LightBlue));
        assert!(!board.owns_full_set(2, ColorSet::LightBlue));
    }
}
