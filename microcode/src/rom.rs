use crate::ds::{Address, RomPlane, WordMap, ADDRESS_SPACE, PLANE_COUNT};

/// Splits every control word into its bytes, one ROM chip per byte.
///
/// Plane 0 holds the least significant byte.
pub(crate) fn split(words: &WordMap) -> [RomPlane; PLANE_COUNT] {
    std::array::from_fn(|index| {
        let mut bytes = [0u8; ADDRESS_SPACE];
        for address in Address::all() {
            bytes[address.index()] = words.get(address).byte(index);
        }
        RomPlane { index, bytes }
    })
}
