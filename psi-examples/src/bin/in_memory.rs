//! In-memory example of PSI protocol execution.
//!
//! This example runs the client and the server within a single process,
//! passing the serialized messages between them directly instead of over a
//! network.
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --bin in_memory
//! ```

use log::info;
use psi_engine::{DataStructure, PsiClient, PsiServer, Response, SetupMessage};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    println!("=== PSI Engine In-Memory Example (v{}) ===\n", psi_engine::version());

    // Client's private set
    let client_items: Vec<Vec<u8>> = vec![
        b"client_secret_1".to_vec(),
        b"shared_secret_1".to_vec(),
        b"client_secret_2".to_vec(),
        b"shared_secret_2".to_vec(),
    ];

    // Server's private set
    let server_items: Vec<Vec<u8>> = vec![
        b"server_secret_1".to_vec(),
        b"shared_secret_1".to_vec(),
        b"server_secret_2".to_vec(),
        b"shared_secret_2".to_vec(),
        b"server_secret_3".to_vec(),
    ];

    println!("Client's items ({}):", client_items.len());
    for (i, item) in client_items.iter().enumerate() {
        println!("  {}: {}", i, String::from_utf8_lossy(item));
    }

    println!("\nServer's items ({}):", server_items.len());
    for (i, item) in server_items.iter().enumerate() {
        println!("  {}: {}", i, String::from_utf8_lossy(item));
    }

    // === Phase 1: Server setup (offline) ===
    println!("\n--- Phase 1: Server Setup ---");
    let server = PsiServer::new();
    for ds in [DataStructure::BloomFilter, DataStructure::Raw] {
        let bytes = server
            .create_setup_message(0.0001, client_items.len(), &server_items, ds)?
            .to_bytes();
        println!("{} setup message: {} bytes", ds, bytes.len());
    }
    let setup_bytes = server
        .create_setup_message(0.0001, client_items.len(), &server_items, DataStructure::Gcs)?
        .to_bytes();
    println!("{} setup message: {} bytes (used below)", DataStructure::Gcs, setup_bytes.len());

    // === Phase 2: Client request ===
    println!("\n--- Phase 2: Client Request ---");
    let mut client = PsiClient::new(true);
    let request_bytes = client.create_request(&client_items)?.to_bytes();
    println!("Request: {} bytes", request_bytes.len());

    // === Phase 3: Server response ===
    // In a real deployment these buffers would travel over the network (with TLS!)
    println!("\n--- Phase 3: Server Response ---");
    let response_bytes = server.process_request_bytes(&request_bytes)?;
    let response = Response::from_bytes(&response_bytes)?;
    println!("Response: {} bytes", response_bytes.len());
    for element in response.elements() {
        println!("  {}..", hex::encode(&element.as_bytes()[..8]));
    }

    // === Phase 4: Client computes the intersection ===
    println!("\n--- Phase 4: Compute Intersection ---");
    let setup = SetupMessage::from_bytes(&setup_bytes)?;
    let intersection = client.get_intersection(&setup, &response)?;
    info!("client state after intersection: {}", client.state().name());

    println!("\n=== Results ===");
    println!("Intersection items:");
    for index in &intersection {
        println!("  {}: {}", index, String::from_utf8_lossy(&client_items[*index]));
    }

    // === Count-only client against the same setup message ===
    println!("\n=== Cardinality-Only Client ===\n");
    let mut counter = PsiClient::new(false);
    let request = counter.create_request(&client_items)?;
    let response = server.process_request(&request)?;
    // The same setup message serves every client
    let size = counter.get_intersection_size(&setup, &response)?;
    println!("Intersection size: {} (expected: 2)", size);

    println!("\n✓ Protocol completed successfully!");
    Ok(())
}
