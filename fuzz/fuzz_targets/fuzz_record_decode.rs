#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Stored records must decode or fail cleanly, never panic.
    if let Ok(bounty) = bincode::deserialize::<bounty_types::Bounty>(data) {
        let _ = bounty.accepted_fulfilment();
        let _ = bounty.next_fulfilment_id();
        let _ = bincode::serialize(&bounty);
    }
    let _ = bincode::deserialize::<bounty_types::Fulfilment>(data);
    let _ = bincode::deserialize::<bounty_types::EscrowHandle>(data);
    let _ = bincode::deserialize::<bounty_types::Identity>(data);
    let _ = bincode::deserialize::<bounty_types::Amount>(data);

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = text.parse::<bounty_types::Amount>();
        let _ = text.parse::<bounty_types::BountyId>();
        let _ = text.parse::<bounty_types::Identity>();
    }
});
