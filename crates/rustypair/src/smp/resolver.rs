//! Authentication method selection
//!
//! Picks the pairing flavour and association model from the features the
//! two peers exchanged in the Pairing Request and Pairing Response. The
//! checks run in a fixed order (LESC, OOB, MITM, IO capabilities); changing
//! the order changes the outcome for real capability combinations.

use super::types::*;
use log::debug;

/// Decide the authentication method for a Pairing Request / Pairing Response
/// pair.
///
/// LE Secure Connections is reported but never given an association model:
/// the caller has to reject it. In Legacy pairing Numeric Comparison is not
/// reachable.
pub fn resolve(preq: &PairingFeatures, pres: &PairingFeatures) -> AuthenticationMethod {
    if preq.secure_connections() && pres.secure_connections() {
        return AuthenticationMethod {
            auth_type: AuthType::SecureConnections,
            model: AssociationModel::Unresolved,
        };
    }

    if preq.oob_data_present && pres.oob_data_present {
        return AuthenticationMethod::legacy(AssociationModel::OutOfBand);
    }

    if !preq.mitm() && !pres.mitm() {
        return AuthenticationMethod::legacy(AssociationModel::JustWorks);
    }

    AuthenticationMethod::legacy(io_capability_model(
        preq.io_capability,
        pres.io_capability,
    ))
}

fn io_capability_model(initiator: IoCapability, responder: IoCapability) -> AssociationModel {
    use IoCapability::*;

    if initiator == NoInputNoOutput || responder == NoInputNoOutput {
        AssociationModel::JustWorks
    } else if initiator == DisplayOnly && responder == DisplayOnly {
        AssociationModel::JustWorks
    } else if initiator == DisplayYesNo || responder == DisplayYesNo {
        AssociationModel::JustWorks
    } else {
        AssociationModel::Passkey
    }
}

/// Resolve from the raw Pairing Request and Pairing Response PDUs.
///
/// Both PDUs have to be captured first; asking before that is a
/// programming error and reported as [`SmpError::MissingPrecondition`].
pub fn resolve_exchange(preq: Option<&[u8]>, pres: Option<&[u8]>) -> SmpResult<AuthenticationMethod> {
    let preq = preq.ok_or(SmpError::MissingPrecondition(
        "pairing request not captured",
    ))?;
    let pres = pres.ok_or(SmpError::MissingPrecondition(
        "pairing response not captured",
    ))?;

    let initiator = PairingFeatures::from_pdu(preq)?;
    let responder = PairingFeatures::from_pdu(pres)?;
    let method = resolve(&initiator, &responder);

    debug!(
        "Resolved {} (initiator {} oob={} mitm={}, responder {} oob={} mitm={})",
        method,
        initiator.io_capability,
        initiator.oob_data_present,
        initiator.mitm(),
        responder.io_capability,
        responder.oob_data_present,
        responder.mitm()
    );

    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smp::constants::*;

    fn features(io: IoCapability, oob: bool, mitm: bool, sc: bool) -> PairingFeatures {
        let mut auth_req = AuthReq::BONDING;
        auth_req.set(AuthReq::MITM, mitm);
        auth_req.set(AuthReq::SECURE_CONNECTIONS, sc);
        PairingFeatures {
            io_capability: io,
            oob_data_present: oob,
            auth_req,
            ..PairingFeatures::default()
        }
    }

    /// Legacy IO capability table, initiator rows by responder columns, in
    /// protocol value order: DisplayOnly, DisplayYesNo, KeyboardOnly,
    /// NoInputNoOutput, KeyboardDisplay
    const IO_TABLE: [[AssociationModel; 5]; 5] = {
        use AssociationModel::{JustWorks as J, Passkey as P};
        [
            [J, J, P, J, P],
            [J, J, J, J, J],
            [P, J, P, J, P],
            [J, J, J, J, J],
            [P, J, P, J, P],
        ]
    };

    #[test]
    fn test_legacy_decision_table() {
        for preq_oob in [false, true] {
            for pres_oob in [false, true] {
                for preq_mitm in [false, true] {
                    for pres_mitm in [false, true] {
                        for (i, preq_io) in IoCapability::ALL.iter().enumerate() {
                            for (r, pres_io) in IoCapability::ALL.iter().enumerate() {
                                let preq = features(*preq_io, preq_oob, preq_mitm, false);
                                let pres = features(*pres_io, pres_oob, pres_mitm, false);

                                let expected = if preq_oob && pres_oob {
                                    AssociationModel::OutOfBand
                                } else if !preq_mitm && !pres_mitm {
                                    AssociationModel::JustWorks
                                } else {
                                    IO_TABLE[i][r]
                                };

                                let method = resolve(&preq, &pres);
                                assert_eq!(method.auth_type, AuthType::Legacy);
                                assert_eq!(
                                    method.model, expected,
                                    "preq {:?} oob={} mitm={}, pres {:?} oob={} mitm={}",
                                    preq_io, preq_oob, preq_mitm, pres_io, pres_oob, pres_mitm
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_display_only_pair_is_just_works() {
        let preq = features(IoCapability::DisplayOnly, false, true, false);
        let pres = features(IoCapability::DisplayOnly, false, true, false);
        assert_eq!(
            resolve(&preq, &pres),
            AuthenticationMethod::legacy(AssociationModel::JustWorks)
        );
    }

    #[test]
    fn test_oob_wins_over_mitm_and_io() {
        // Keyboard on both ends with MITM would be Passkey without OOB
        let preq = features(IoCapability::KeyboardOnly, true, true, false);
        let pres = features(IoCapability::KeyboardOnly, true, true, false);
        assert_eq!(resolve(&preq, &pres).model, AssociationModel::OutOfBand);

        // OOB on one side only does not count
        let pres = features(IoCapability::KeyboardOnly, false, true, false);
        assert_eq!(resolve(&preq, &pres).model, AssociationModel::Passkey);
    }

    #[test]
    fn test_secure_connections_needs_both_peers() {
        for preq_io in IoCapability::ALL {
            for pres_io in IoCapability::ALL {
                for oob in [false, true] {
                    for mitm in [false, true] {
                        let preq = features(preq_io, oob, mitm, true);
                        let pres = features(pres_io, oob, mitm, true);
                        let method = resolve(&preq, &pres);
                        assert_eq!(method.auth_type, AuthType::SecureConnections);
                        assert!(!method.is_supported());
                    }
                }
            }
        }

        // Only one side asks for LESC: Legacy
        let preq = features(IoCapability::KeyboardOnly, false, false, false);
        let pres = features(IoCapability::DisplayOnly, false, false, true);
        assert_eq!(
            resolve(&preq, &pres),
            AuthenticationMethod::legacy(AssociationModel::JustWorks)
        );
    }

    #[test]
    fn test_numeric_comparison_unreachable_in_legacy() {
        for preq_io in IoCapability::ALL {
            for pres_io in IoCapability::ALL {
                let preq = features(preq_io, false, true, false);
                let pres = features(pres_io, false, true, false);
                assert_ne!(
                    resolve(&preq, &pres).model,
                    AssociationModel::NumericComparison
                );
            }
        }
    }

    #[test]
    fn test_resolve_exchange_requires_both_pdus() {
        let preq = PairingFeatures::default().to_pdu(SMP_PAIRING_REQUEST);
        let pres = [0x02, 0x00, 0x00, 0x01, 0x10, 0x00, 0x01];

        assert!(matches!(
            resolve_exchange(Some(&preq[..]), None),
            Err(SmpError::MissingPrecondition(_))
        ));
        assert!(matches!(
            resolve_exchange(None, Some(&pres[..])),
            Err(SmpError::MissingPrecondition(_))
        ));

        let method = resolve_exchange(Some(&preq[..]), Some(&pres[..])).unwrap();
        assert_eq!(method, AuthenticationMethod::legacy(AssociationModel::JustWorks));
    }
}
