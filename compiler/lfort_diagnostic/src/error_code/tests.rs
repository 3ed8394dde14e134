use super::*;

#[test]
fn display_matches_identifier() {
    assert_eq!(ErrorCode::E1001.to_string(), "E1001");
    assert_eq!(ErrorCode::E3001.as_str(), "E3001");
}

#[test]
fn every_code_belongs_to_exactly_one_phase() {
    for code in ErrorCode::ALL {
        let flags = [
            code.is_intrinsic_error(),
            code.is_verify_error(),
            code.is_codegen_error(),
            code.is_driver_error(),
            code.is_internal_error(),
        ];
        let true_count = flags.iter().filter(|&&f| f).count();
        assert_eq!(true_count, 1, "{code} matched {true_count} phases");
    }
}

#[test]
fn parse_round_trips() {
    for code in ErrorCode::ALL {
        assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(*code));
    }
    assert_eq!("e4001".parse::<ErrorCode>(), Ok(ErrorCode::E4001));
    assert_eq!("E0000".parse::<ErrorCode>(), Err(()));
}
