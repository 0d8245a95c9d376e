//! Property tests for frame encoding and label reconciliation.

use proptest::prelude::*;
use tc_client::codec::{
    ClientMessage, Label, ProcessDataCommand, ProcessDataFrame, ServerMessage, MAX_ELEMENT_NUMBER,
};
use tc_client::protocol::label::{compare, compare_optional};
use tc_client::protocol::{LabelMatch, LABEL_NOT_PRESENT};

proptest! {
    #[test]
    fn test_value_command_layout(
        element in 0..=MAX_ELEMENT_NUMBER,
        ddi in any::<u16>(),
        value in any::<u32>(),
    ) {
        let frame = ProcessDataFrame::value_command(element, ddi, value).unwrap();
        let bytes = ClientMessage::ProcessData(frame).encode();

        let word0 = u16::from_le_bytes([bytes[0], bytes[1]]);
        prop_assert_eq!(word0 & 0x0F, 0x03);
        prop_assert_eq!(word0 >> 4, element);
        prop_assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), ddi);
        prop_assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), value);

        // A server echo of the same bytes decodes to the same fields
        let decoded = ProcessDataFrame::decode(&bytes).unwrap();
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn test_element_out_of_range_rejected(element in (MAX_ELEMENT_NUMBER + 1)..=u16::MAX) {
        prop_assert!(ProcessDataFrame::value_command(element, 0, 0).is_err());
    }

    #[test]
    fn test_server_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..12)) {
        let _ = ServerMessage::decode(&data);
    }

    #[test]
    fn test_runtime_commands_decode_as_process_data(
        command in 2u8..=0x0D,
        element in 0..=MAX_ELEMENT_NUMBER,
        ddi in any::<u16>(),
        value in any::<u32>(),
    ) {
        let word0 = (element << 4) | u16::from(command);
        let mut data = [0u8; 8];
        data[..2].copy_from_slice(&word0.to_le_bytes());
        data[2..4].copy_from_slice(&ddi.to_le_bytes());
        data[4..].copy_from_slice(&value.to_le_bytes());

        match ServerMessage::decode(&data).unwrap() {
            ServerMessage::ProcessData(frame) => {
                prop_assert_eq!(frame.command, ProcessDataCommand::from_nibble(command));
                prop_assert_eq!(frame.element, element);
                prop_assert_eq!(frame.ddi, ddi);
                prop_assert_eq!(frame.value, value);
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn test_label_compare_is_total(received in any::<Label>(), stored in any::<Label>()) {
        let outcome = compare(&received, &stored);
        if received == stored {
            prop_assert_eq!(outcome, LabelMatch::Match);
        } else if received == LABEL_NOT_PRESENT {
            prop_assert_eq!(outcome, LabelMatch::NotPresent);
        } else {
            prop_assert_eq!(outcome, LabelMatch::Mismatch);
        }
        prop_assert_eq!(compare_optional(&received, Some(&stored)), outcome);
    }

    #[test]
    fn test_label_without_stored_pool(received in any::<Label>()) {
        let outcome = compare_optional(&received, None);
        if received == LABEL_NOT_PRESENT {
            prop_assert_eq!(outcome, LabelMatch::NotPresent);
        } else {
            prop_assert_eq!(outcome, LabelMatch::Mismatch);
        }
    }
}

#[test]
fn test_status_frame_is_not_process_data() {
    let msg = ServerMessage::decode(&[0xFE, 0xFF, 0xFF, 0xFF, 0x01, 0x83, 0x02, 0xFF]).unwrap();
    match msg {
        ServerMessage::Status(status) => {
            assert!(status.is_task_active());
            assert_eq!(status.command_address, 0x83);
            assert_eq!(status.command, 0x02);
        }
        other => panic!("unexpected {other:?}"),
    }
}
