/// Example running a Just Works pairing against an in-memory responder
///
/// The responder is simulated in this file; the pairing session is the real
/// one. The resulting bond is written to a JSON file in the temp directory.
use rustypair::smp::constants::*;
use rustypair::smp::*;
use rustypair::*;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::sync::Arc;

/// Minimal LE Legacy responder: DisplayOnly, no MITM, distributes its LTK
struct Responder {
    crypto: AesCrypto,
    address: Address,
    initiator: Address,
    pres: [u8; 7],
    preq: [u8; 7],
    random: [u8; 16],
    ltk: [u8; 16],
}

impl Responder {
    fn confirm(&self, random: &[u8; 16]) -> [u8; 16] {
        self.crypto.c1(
            &[0u8; 16],
            random,
            &self.pres,
            &self.preq,
            self.initiator.kind.flag(),
            &self.initiator.addr.bytes,
            self.address.kind.flag(),
            &self.address.addr.bytes,
        )
    }

    /// Answer one PDU from the initiator
    fn handle(&mut self, pdu: &[u8], initiator_confirm: &mut [u8; 16]) -> Vec<Vec<u8>> {
        match SmpCommand::parse(pdu) {
            Ok(SmpCommand::PairingRequest(_)) => {
                self.preq.copy_from_slice(pdu);
                vec![self.pres.to_vec()]
            }
            Ok(SmpCommand::PairingConfirm(confirm)) => {
                *initiator_confirm = confirm;
                vec![SmpCommand::PairingConfirm(self.confirm(&self.random)).serialize()]
            }
            Ok(SmpCommand::PairingRandom(random)) => {
                if self.confirm(&random) != *initiator_confirm {
                    return vec![SmpCommand::PairingFailed(FailureReason::ConfirmValueFailed)
                        .serialize()];
                }
                let stk = self.crypto.s1(&[0u8; 16], &self.random, &random);
                println!("Responder derived STK {}", hex::encode(stk));
                vec![
                    SmpCommand::PairingRandom(self.random).serialize(),
                    SmpCommand::EncryptionInformation(self.ltk).serialize(),
                    SmpCommand::MasterIdentification {
                        ediv: 0x1234,
                        rand: rand::random(),
                    }
                    .serialize(),
                ]
            }
            other => {
                println!("Responder ignoring {:?}", other);
                Vec::new()
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    println!("LE Legacy Pairing Example");
    println!("-------------------------");

    let local: Address = Address::public("00:11:22:33:44:55".parse()?);
    let remote: Address = Address::random("c0:ff:ee:00:00:01".parse()?);

    let path = std::env::temp_dir().join("rustypair-example-bonds.json");
    let store = Arc::new(FileBondingStore::new(&path));
    println!("Bonds are kept in {}", path.display());

    let manager = SmpManager::new(local, Arc::new(AesCrypto::new()), store);
    manager.set_event_callback(|event| -> SmpResult<()> {
        match &event {
            SmpEvent::BondingInfoFound(addr, record) => {
                println!("{} is already bonded (EDIV 0x{:04x})", addr, record.ediv)
            }
            SmpEvent::PairingSucceeded(addr, stk, level) => {
                println!("Paired with {} at {:?}, STK {}", addr, level, hex::encode(stk))
            }
            SmpEvent::BondStored(addr, _) => println!("Bond with {} stored", addr),
            SmpEvent::PairingFailed(addr, error) => {
                println!("Pairing with {} failed: {}", addr, error)
            }
            other => println!("Other SMP event: {:?}", other),
        }
        Ok(())
    });

    let mut responder = Responder {
        crypto: AesCrypto::new(),
        address: remote,
        initiator: local,
        pres: [
            SMP_PAIRING_RESPONSE,
            SMP_IO_CAPABILITY_DISPLAY_ONLY,
            SMP_OOB_NOT_PRESENT,
            SMP_AUTH_REQ_BONDING,
            SMP_MAX_ENCRYPTION_KEY_SIZE,
            0x00,
            SMP_KEY_DIST_ENC_KEY,
        ],
        preq: [0u8; 7],
        random: AesCrypto::new().random_nonce(),
        ltk: rand::random(),
    };
    let mut initiator_confirm = [0u8; 16];

    let transport = Arc::new(MemoryTransport::new());
    manager.initiate_pairing(remote, transport.clone())?;

    // Shuttle frames between the two sides until nobody has anything to say
    loop {
        let outbound = transport.take_sent();
        if outbound.is_empty() {
            break;
        }
        for (channel_id, pdu) in outbound {
            for reply in responder.handle(&pdu, &mut initiator_confirm) {
                let frame = l2cap::build_basic_frame(channel_id, &reply)?;
                if let Err(err) = manager.handle_l2cap_frame(&remote.addr, &frame) {
                    println!("Session rejected packet: {}", err);
                }
            }
        }
    }

    println!("Final phase: {:?}", manager.phase(&remote.addr));
    println!("Bonded devices: {:?}", manager.bonded_devices()?);

    manager.handle_disconnect(&remote.addr)?;
    Ok(())
}
