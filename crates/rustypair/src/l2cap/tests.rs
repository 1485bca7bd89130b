//! Tests for the L2CAP fixed channel helpers

#[cfg(test)]
mod tests {
    use super::super::constants::*;
    use super::super::packet::*;
    use super::super::transport::*;

    #[test]
    fn test_l2cap_header() {
        // Create a header
        let header = L2capHeader::new(10, L2CAP_CID_SMP);

        // Serialize and parse
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x0A, 0x00, 0x06, 0x00]);
        let parsed = L2capHeader::parse(&bytes).unwrap();

        // Check parsed values
        assert_eq!(parsed.length, 10);
        assert_eq!(parsed.channel_id, L2CAP_CID_SMP);

        // Too short to hold a header
        assert!(L2capHeader::parse(&[0x01, 0x00, 0x06]).is_none());
    }

    #[test]
    fn test_split_basic_frame() {
        let frame = [0x02, 0x00, 0x06, 0x00, 0x05, 0x04];
        let (cid, payload) = split_basic_frame(&frame).unwrap();
        assert_eq!(cid, L2CAP_CID_SMP);
        assert_eq!(payload, &[0x05, 0x04]);

        // Length field disagrees with the payload
        let truncated = [0x03, 0x00, 0x06, 0x00, 0x05, 0x04];
        assert!(matches!(
            split_basic_frame(&truncated),
            Err(TransportError::MalformedFrame(_))
        ));

        assert!(split_basic_frame(&[0x00]).is_err());
    }

    #[test]
    fn test_build_basic_frame() {
        let frame = build_basic_frame(L2CAP_CID_ATT, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(frame, vec![0x03, 0x00, 0x04, 0x00, 0x01, 0x02, 0x03]);

        let (cid, payload) = split_basic_frame(&frame).unwrap();
        assert_eq!(cid, L2CAP_CID_ATT);
        assert_eq!(payload, &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_memory_transport() {
        let transport = MemoryTransport::new();
        transport.write(L2CAP_CID_SMP, &[0x01]).unwrap();
        transport.write(L2CAP_CID_SMP, &[0x02]).unwrap();
        assert_eq!(transport.sent_count(), 2);

        let sent = transport.take_sent();
        assert_eq!(sent, vec![(L2CAP_CID_SMP, vec![0x01]), (L2CAP_CID_SMP, vec![0x02])]);
        assert_eq!(transport.sent_count(), 0);

        transport.close();
        assert_eq!(
            transport.write(L2CAP_CID_SMP, &[0x03]),
            Err(TransportError::Disconnected)
        );
    }
}
