use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct FacetCut {
        address facetAddress;
        uint8 action;
        bytes4[] functionSelectors;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Facet {
        address facetAddress;
        bytes4[] functionSelectors;
    }

    interface IDiamondCut {
        function diamondCut(FacetCut[] calldata _diamondCut, address _init, bytes calldata _calldata) external;

        event DiamondCut(FacetCut[] _diamondCut, address _init, bytes _calldata);
    }

    interface IDiamondLoupe {
        function facets() external view returns (Facet[] memory facets_);

        function facetAddress(bytes4 _functionSelector) external view returns (address facetAddress_);
    }

    interface ICreate2Deployer {
        function deploy(uint256 value, bytes32 salt, bytes memory code) external;

        function computeAddress(bytes32 salt, bytes32 codeHash) external view returns (address);
    }

    #[derive(Debug, PartialEq, Eq)]
    struct FactoryConstructParams {
        address validatorLibAddress;
        address maRenderUtilsAddress;
        address diamondCutFacetAddress;
        address diamondLoupeFacetAddress;
        address nestableFacetAddress;
        address multiAssetFacetAddress;
        address equippableFacetAddress;
        address collectionMetadataFacetAddress;
        address initContractAddress;
        address implContractAddress;
        FacetCut[] cuts;
    }
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct CatalogPartData {
        uint8 itemType;
        uint8 z;
        address[] equippable;
        string metadataURI;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct IntakeStruct {
        uint64 partId;
        CatalogPartData part;
    }

    interface ICatalog {
        function addPartList(IntakeStruct[] memory partIntake) external;

        function setEquippableToAll(uint64 partId) external;
    }
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct CollectionInit {
        string name;
        string symbol;
        string fallbackURI;
        string collectionMetadataURI;
    }

    interface ICollectionInit {
        function init(CollectionInit calldata _initStruct, address owner) external;
    }
}
